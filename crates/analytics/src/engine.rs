use crate::report::{MonthlyPerformance, PerformanceReport};
use crate::trade::ClosedTrade;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A stateless calculator for the performance report.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the report from closed trades.
    ///
    /// The drawdown and the monthly breakdown follow close time, so `trades`
    /// may come in any order.
    pub fn calculate(&self, trades: &[ClosedTrade]) -> PerformanceReport {
        let mut report = PerformanceReport::new();
        if trades.is_empty() {
            return report;
        }

        let mut ordered: Vec<&ClosedTrade> = trades.iter().collect();
        ordered.sort_by_key(|t| t.closed_at);

        self.calculate_profitability(&ordered, &mut report);
        self.calculate_drawdown(&ordered, &mut report);
        self.calculate_monthly(&ordered, &mut report);
        report
    }

    fn calculate_profitability(&self, trades: &[&ClosedTrade], report: &mut PerformanceReport) {
        report.total_trades = trades.len();

        for trade in trades {
            report.total_pnl_pct += trade.pnl_percent;
            if trade.is_win() {
                report.winning_trades += 1;
            } else {
                report.losing_trades += 1;
            }
        }

        let count = Decimal::from(report.total_trades);
        report.win_rate_pct = Some(Decimal::from(report.winning_trades) / count * Decimal::ONE_HUNDRED);
        report.average_pnl_pct = Some(report.total_pnl_pct / count);
        report.best_trade_pct = trades.iter().map(|t| t.pnl_percent).max();
        report.worst_trade_pct = trades.iter().map(|t| t.pnl_percent).min();
    }

    /// Max drawdown of the cumulative PnL curve, which starts at zero.
    fn calculate_drawdown(&self, trades: &[&ClosedTrade], report: &mut PerformanceReport) {
        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;

        for trade in trades {
            equity += trade.pnl_percent;
            peak = peak.max(equity);
            max_drawdown = max_drawdown.max(peak - equity);
        }
        report.max_drawdown_pct = max_drawdown;
    }

    fn calculate_monthly(&self, trades: &[&ClosedTrade], report: &mut PerformanceReport) {
        let mut months: BTreeMap<String, MonthlyPerformance> = BTreeMap::new();
        for trade in trades {
            let month = trade.closed_at.format("%Y-%m").to_string();
            let entry = months.entry(month.clone()).or_insert_with(|| MonthlyPerformance {
                month,
                trades: 0,
                wins: 0,
                pnl_pct: Decimal::ZERO,
            });
            entry.trades += 1;
            entry.pnl_pct += trade.pnl_percent;
            if trade.is_win() {
                entry.wins += 1;
            }
        }
        report.monthly = months.into_values().collect();
    }
}
