use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Longest span, in seconds, any configured lookback or separation may cover.
pub const MAX_SPAN_SECS: i64 = 10 * 365 * 86_400;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageSettings,
    pub detector: DetectorSettings,
    pub scheduler: SchedulerSettings,
    pub bar_source: BarSourceSettings,
    pub history: HistorySettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Rejects parameter combinations the detector and scheduler cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));
        let d = &self.detector;

        if d.window == 0 || d.local_window == 0 {
            return fail("detector.window and detector.local_window must be at least 1");
        }
        if d.retest_tolerance <= Decimal::ZERO || d.retest_tolerance >= Decimal::ONE {
            return fail("detector.retest_tolerance must be between 0 and 1");
        }
        if d.stop_loss_pct <= Decimal::ZERO || d.stop_loss_pct >= Decimal::ONE {
            return fail("detector.stop_loss_pct must be between 0 and 1");
        }
        if d.take_profit_pct <= Decimal::ZERO {
            return fail("detector.take_profit_pct must be greater than 0");
        }
        if d.bar_seconds <= 0 {
            return fail("detector.bar_seconds must be greater than 0");
        }
        if self.scheduler.interval_secs == 0 {
            return fail("scheduler.interval_secs must be greater than 0");
        }
        if self.bar_source.max_attempts == 0 {
            return fail("bar_source.max_attempts must be at least 1");
        }
        if self.history.timeframe_secs <= 0 || self.history.timeframe_secs > MAX_SPAN_SECS {
            return fail("history.timeframe_secs must be greater than 0 and at most ten years");
        }
        if d.bar_seconds > MAX_SPAN_SECS || d.min_bars < 0 || d.min_bars.saturating_mul(d.bar_seconds) > MAX_SPAN_SECS {
            return fail("detector.min_bars * detector.bar_seconds must be between 0 and ten years");
        }
        if !(0..=MAX_SPAN_SECS).contains(&self.scheduler.fallback_lookback_secs) {
            return fail("scheduler.fallback_lookback_secs must be between 0 and ten years");
        }
        if self.history.max_days <= 0 || self.history.max_days.saturating_mul(86_400) > MAX_SPAN_SECS {
            return fail("history.max_days must be between 1 and ten years");
        }
        Ok(())
    }
}

/// Where the JSON buckets live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Parameters of the breakout-retest signal detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Tickers the detector pipeline refreshes and scans.
    pub tickers: Vec<String>,
    /// Trailing window (in bars) that confirms a global extreme.
    pub window: usize,
    /// Trailing window (in bars) for the finer local extrema.
    pub local_window: usize,
    /// Reduce local extrema to their unbroken envelope before matching.
    pub local_unbroken: bool,
    /// Maximum relative distance between a retest and its level (0.002 = 0.2%).
    pub retest_tolerance: Decimal,
    /// Minimum number of bars between a level and its retest.
    pub min_bars: i64,
    /// Duration of one history bar in seconds.
    pub bar_seconds: i64,
    /// Take-profit distance from the limit price (0.02 = 2%).
    pub take_profit_pct: Decimal,
    /// Stop-loss distance from the limit price (0.005 = 0.5%).
    pub stop_loss_pct: Decimal,
    /// Cadence of `detect --watch`.
    pub refresh_secs: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            window: 50,
            local_window: 1,
            local_unbroken: true,
            retest_tolerance: dec!(0.002),
            min_bars: 20,
            bar_seconds: 900,
            take_profit_pct: dec!(0.02),
            stop_loss_pct: dec!(0.005),
            refresh_secs: 3600,
        }
    }
}

impl DetectorSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}

/// Parameters of the periodic fill/close tick.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_secs: u64,
    /// Lookback used by the first tick, before any checkpoint exists.
    pub fallback_lookback_secs: i64,
    /// Pick up request-bucket entries written while the scheduler is running.
    pub ingest_requests_each_tick: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            fallback_lookback_secs: 60,
            ingest_requests_each_tick: true,
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// The live candle feed used by the scheduler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BarSourceSettings {
    /// Replay stored history instead of calling the exchange.
    pub mock_mode: bool,
    pub base_url: String,
    pub engine: String,
    pub market: String,
    /// Candle interval code understood by the exchange (1 = one minute).
    pub interval: u32,
    pub timeout_ms: u64,
    /// Attempts per ticker; only timeouts are retried.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Offset of the exchange's local candle timestamps from UTC.
    pub exchange_utc_offset_hours: i32,
}

impl Default for BarSourceSettings {
    fn default() -> Self {
        Self {
            mock_mode: false,
            base_url: "https://iss.moex.com".to_string(),
            engine: "stock".to_string(),
            market: "shares".to_string(),
            interval: 1,
            timeout_ms: 10_000,
            max_attempts: 2,
            retry_backoff_ms: 1_000,
            exchange_utc_offset_hours: 3,
        }
    }
}

impl BarSourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// The historical bar download that feeds the detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub base_url: String,
    pub exchange: String,
    pub board: String,
    pub timeframe_secs: i64,
    /// Depth of a full download when no history is stored yet.
    pub max_days: i64,
    pub timeout_ms: u64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.alor.ru".to_string(),
            exchange: "MOEX".to_string(),
            board: "TQBR".to_string(),
            timeframe_secs: 900,
            max_days: 30,
            timeout_ms: 15_000,
        }
    }
}

impl HistorySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            file_prefix: "retest.log".to_string(),
        }
    }
}
