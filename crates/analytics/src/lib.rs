//! # Retest Analytics
//!
//! Statistics over the simulated trade history.
//!
//! ## Architectural Principles
//!
//! - **Stateless Calculation:** `TradeStatistics::calculate` and `AnalyticsEngine` take
//!   closed-order records as input and produce a summary as output. Only the `load`
//!   helpers touch storage.
//! - **One view of a trade:** every metric works on `ClosedTrade`, which resolves
//!   duplicates across buckets and legacy records without a stored PnL.
//!
//! ## Public API
//!
//! - `TradeStatistics`: total and current-day trade count and PnL.
//! - `AnalyticsEngine` / `PerformanceReport`: the extended report.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

pub mod engine;
pub mod error;
pub mod report;
pub mod stats;
pub mod trade;

pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use report::{MonthlyPerformance, PerformanceReport};
pub use stats::{TradeStatistics, TradeTotals, local_day_start};
pub use trade::{ClosedTrade, closed_trades, load_closed_trades};
