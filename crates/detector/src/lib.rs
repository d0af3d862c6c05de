//! # Retest Signal Detector
//!
//! Turns a ticker's bar history into breakout-retest limit orders.
//!
//! ## Architectural Principles
//!
//! - **Pure core:** `Detector::detect` works on a bar slice and returns levels and
//!   candidate orders without touching storage or the network.
//! - **Pipeline at the edge:** `pipeline` refreshes history, persists levels and
//!   merges requests into the request buckets. It is the only part that does I/O.
//!
//! ## Public API
//!
//! - `Detector`: the configured detector.
//! - `Detection`: everything one detection pass produced for a ticker.
//! - The building blocks (`rolling_extrema`, `filter_unbroken_levels`,
//!   `local_extrema`, `find_retests`, `synthesize_order`, `merge_requests`).

pub mod error;
pub mod extrema;
pub mod pipeline;
pub mod retest;
pub mod synthesis;

pub use error::DetectorError;
pub use extrema::{filter_unbroken_levels, global_levels, local_extrema, rolling_extrema};
pub use pipeline::{Pipeline, TickerRun};
pub use retest::{Retest, RetestRules, find_retests};
pub use synthesis::{BracketRule, CandidateOrder, ceil2, dedupe_by_limit, floor2, merge_requests, synthesize_order};

use configuration::DetectorSettings;
use core_types::{Bar, ExtremeLevel, LevelKind, OrderRequestRecord, OrderSide};
use rust_decimal::Decimal;

/// Levels and order requests found for one ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub global_highs: Vec<ExtremeLevel>,
    pub global_lows: Vec<ExtremeLevel>,
    pub local_highs: Vec<ExtremeLevel>,
    pub local_lows: Vec<ExtremeLevel>,
    pub buys: Vec<OrderRequestRecord>,
    pub sells: Vec<OrderRequestRecord>,
}

impl Detection {
    pub fn requests(&self, side: OrderSide) -> &[OrderRequestRecord] {
        match side {
            OrderSide::Buy => &self.buys,
            OrderSide::Sell => &self.sells,
        }
    }
}

/// The breakout-retest detector.
#[derive(Debug, Clone)]
pub struct Detector {
    window: usize,
    local_window: usize,
    local_unbroken: bool,
    rules: RetestRules,
    bracket: BracketRule,
}

impl Detector {
    pub fn new(settings: &DetectorSettings) -> Result<Self, DetectorError> {
        if settings.window == 0 || settings.local_window == 0 {
            return Err(DetectorError::InvalidParameters(
                "window and local_window must be at least 1".to_string(),
            ));
        }
        if settings.retest_tolerance <= Decimal::ZERO {
            return Err(DetectorError::InvalidParameters(
                "retest_tolerance must be positive".to_string(),
            ));
        }

        Ok(Self {
            window: settings.window,
            local_window: settings.local_window,
            local_unbroken: settings.local_unbroken,
            rules: RetestRules::new(settings.retest_tolerance, settings.min_bars, settings.bar_seconds),
            bracket: BracketRule {
                take_profit_pct: settings.take_profit_pct,
                stop_loss_pct: settings.stop_loss_pct,
            },
        })
    }

    /// Runs the full detection for one ticker over its ascending bar history.
    pub fn detect(&self, ticker: &str, bars: &[Bar]) -> Result<Detection, DetectorError> {
        let mut detection = Detection::default();
        if bars.is_empty() {
            return Ok(detection);
        }

        for kind in [LevelKind::High, LevelKind::Low] {
            let global = global_levels(bars, self.window, kind)?;
            let local = local_extrema(bars, self.local_window, self.local_unbroken, kind, &global)?;

            let requests = dedupe_by_limit(
                find_retests(&global, &local, &self.rules)
                    .iter()
                    .map(|r| synthesize_order(ticker, r, &self.bracket).request)
                    .collect(),
            );

            match kind {
                LevelKind::High => {
                    detection.global_highs = global;
                    detection.local_highs = local;
                    detection.buys = requests;
                }
                LevelKind::Low => {
                    detection.global_lows = global;
                    detection.local_lows = local;
                    detection.sells = requests;
                }
            }
        }

        tracing::debug!(
            ticker,
            global_highs = detection.global_highs.len(),
            global_lows = detection.global_lows.len(),
            buys = detection.buys.len(),
            sells = detection.sells.len(),
            "Detection complete."
        );
        Ok(detection)
    }
}
