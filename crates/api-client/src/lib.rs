use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::Bar;
use std::collections::HashMap;

pub mod alor;
pub mod error;
pub mod moex;
pub mod replay;
pub mod responses;

// --- Public API ---
pub use alor::AlorClient;
pub use moex::{MoexClient, parse_candles};
pub use replay::{FetchRequest, HistoryReplaySource, StaticBarSource};
pub use responses::{HistoryPayload, HistoryResponse, MoexCandlesResponse, MoexTable};

/// The live bar feed the scheduler evaluates orders against.
///
/// Implementations may return a subset of the requested tickers: a ticker that
/// failed or had no bars is simply absent. The whole call only fails for
/// conditions that affect every ticker.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Bars with `from <= timestamp < to`, ascending per ticker.
    async fn fetch(
        &self,
        tickers: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<Bar>>, ApiError>;
}

/// The historical bar download that feeds the detector.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Duration of one downloaded bar.
    fn timeframe_secs(&self) -> i64;

    async fn fetch_history(&self, symbol: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Bar>, ApiError>;
}
