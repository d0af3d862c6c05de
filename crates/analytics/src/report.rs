use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Results of the trades closed in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPerformance {
    /// `YYYY-MM` of the close time.
    pub month: String,
    pub trades: usize,
    pub wins: usize,
    pub pnl_pct: Decimal,
}

/// A summary of the simulated trade history.
///
/// This struct is the output of the `AnalyticsEngine`. All PnL figures are in
/// percent of the entry price, summed per trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    // I. Trade counts
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Option<Decimal>, // None with 0 trades

    // II. Profitability
    pub total_pnl_pct: Decimal,
    pub average_pnl_pct: Option<Decimal>,
    pub best_trade_pct: Option<Decimal>,
    pub worst_trade_pct: Option<Decimal>,

    // III. Risk
    /// Largest fall of the cumulative PnL curve from a previous peak.
    pub max_drawdown_pct: Decimal,

    // IV. Time-based
    pub monthly: Vec<MonthlyPerformance>,
}

impl PerformanceReport {
    /// Creates a new, zeroed-out PerformanceReport.
    pub fn new() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: None,
            total_pnl_pct: Decimal::ZERO,
            average_pnl_pct: None,
            best_trade_pct: None,
            worst_trade_pct: None,
            max_drawdown_pct: Decimal::ZERO,
            monthly: Vec::new(),
        }
    }

    /// Shorthand for `AnalyticsEngine::new().calculate(trades)`.
    pub fn calculate(trades: &[crate::ClosedTrade]) -> Self {
        crate::AnalyticsEngine::new().calculate(trades)
    }
}

impl Default for PerformanceReport {
    fn default() -> Self {
        Self::new()
    }
}
