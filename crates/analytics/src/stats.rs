use crate::error::AnalyticsError;
use crate::trade::{ClosedTrade, load_closed_trades};
use chrono::{DateTime, Duration, Local, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storage::BucketStore;

/// Number of closed trades and their summed PnL in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeTotals {
    pub trades: usize,
    pub pnl_percent: Decimal,
}

impl TradeTotals {
    fn add(&mut self, trade: &ClosedTrade) {
        self.trades += 1;
        self.pnl_percent += trade.pnl_percent;
    }
}

/// All-time and current-day totals of the closed trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistics {
    pub total: TradeTotals,
    pub daily: TradeTotals,
}

impl TradeStatistics {
    /// Totals over `trades`; the daily figure counts trades closed in
    /// `[day_start, day_start + 1 day)`.
    pub fn calculate(trades: &[ClosedTrade], day_start: DateTime<Utc>) -> Self {
        let day_end = day_start + Duration::days(1);
        let mut stats = Self::default();
        for trade in trades {
            stats.total.add(trade);
            if trade.closed_at >= day_start && trade.closed_at < day_end {
                stats.daily.add(trade);
            }
        }
        stats
    }

    /// Scans every persisted order bucket. "Today" is the local calendar day of `now`.
    pub async fn load(store: &dyn BucketStore, now: DateTime<Utc>) -> Result<Self, AnalyticsError> {
        let trades = load_closed_trades(store).await?;
        Ok(Self::calculate(&trades, local_day_start(now)?))
    }
}

/// Local midnight of the day containing `now`, as a UTC instant.
pub fn local_day_start(now: DateTime<Utc>) -> Result<DateTime<Utc>, AnalyticsError> {
    now.with_timezone(&Local)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .ok_or_else(|| AnalyticsError::Calculation(format!("no local midnight for {now}")))
}
