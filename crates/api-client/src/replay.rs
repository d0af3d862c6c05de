use crate::BarSource;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::Bar;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use storage::{Bucket, BucketStore, BucketStoreExt};

fn window(bars: &[Bar], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Bar> {
    let mut selected: Vec<Bar> = bars
        .iter()
        .filter(|b| b.timestamp >= from && b.timestamp < to)
        .copied()
        .collect();
    selected.sort_by_key(|b| b.timestamp);
    selected
}

/// Serves bars from the stored history buckets instead of the exchange.
pub struct HistoryReplaySource {
    store: Arc<dyn BucketStore>,
}

impl HistoryReplaySource {
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BarSource for HistoryReplaySource {
    async fn fetch(
        &self,
        tickers: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<Bar>>, ApiError> {
        let mut result = HashMap::new();
        for ticker in tickers {
            match self.store.read::<Bar>(&Bucket::History(ticker.clone())).await {
                Ok(history) => {
                    let bars = window(&history, from, to);
                    if !bars.is_empty() {
                        result.insert(ticker.clone(), bars);
                    }
                }
                Err(e) => tracing::warn!(ticker = %ticker, error = %e, "Stored history unreadable; ticker skipped."),
            }
        }
        Ok(result)
    }
}

/// A fixed in-memory bar set. Used by tests and dry runs.
///
/// Every call is recorded so callers can inspect the requested windows.
#[derive(Debug, Default)]
pub struct StaticBarSource {
    bars: Mutex<HashMap<String, Vec<Bar>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

/// One recorded `fetch` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub tickers: Vec<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl StaticBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.set_bars(ticker, bars);
        self
    }

    /// Replaces the bars served for `ticker`.
    pub fn set_bars(&self, ticker: &str, bars: Vec<Bar>) {
        let mut guard = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(ticker.to_string(), bars);
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl BarSource for StaticBarSource {
    async fn fetch(
        &self,
        tickers: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<Bar>>, ApiError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(FetchRequest {
                tickers: tickers.to_vec(),
                from,
                to,
            });

        let guard = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tickers
            .iter()
            .filter_map(|t| guard.get(t).map(|bars| (t.clone(), window(bars, from, to))))
            .filter(|(_, bars)| !bars.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use storage::MemoryStore;

    fn bar(secs: i64) -> Bar {
        Bar::new(Utc.timestamp_opt(secs, 0).unwrap(), dec!(11), dec!(9), dec!(10))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn replay_serves_the_half_open_window() {
        let store = Arc::new(MemoryStore::new());
        store
            .overwrite(&Bucket::History("SBER".into()), &[bar(300), bar(0), bar(60), bar(120)])
            .await
            .unwrap();
        let source = HistoryReplaySource::new(store);

        let tickers = vec!["SBER".to_string(), "GAZP".to_string()];
        let bars = source.fetch(&tickers, at(60), at(300)).await.unwrap();
        assert_eq!(bars.len(), 1);
        let times: Vec<i64> = bars["SBER"].iter().map(|b| b.timestamp.timestamp()).collect();
        assert_eq!(times, vec![60, 120]);
    }

    #[tokio::test]
    async fn static_source_records_requests_and_omits_empty_tickers() {
        let source = StaticBarSource::new().with_bars("SBER", vec![bar(0), bar(60)]);
        let tickers = vec!["SBER".to_string(), "LKOH".to_string()];

        let bars = source.fetch(&tickers, at(30), at(90)).await.unwrap();
        assert_eq!(bars["SBER"].len(), 1);
        assert!(!bars.contains_key("LKOH"));

        let empty = source.fetch(&tickers, at(100), at(200)).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(source.requests().len(), 2);
        assert_eq!(source.requests()[0].from, at(30));
    }
}
