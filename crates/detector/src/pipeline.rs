//! History refresh, level persistence and request merging for a set of tickers.

use crate::error::DetectorError;
use crate::synthesis::merge_requests;
use crate::{Detection, Detector};
use api_client::HistorySource;
use chrono::{DateTime, Duration, Utc};
use core_types::{Bar, LevelKind, OrderSide};
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::{Bucket, BucketStore, BucketStoreExt};

/// Outcome of a history refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryRefresh {
    pub downloaded: usize,
    pub total: usize,
}

/// Outcome of one ticker's detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerRun {
    pub ticker: String,
    pub bars: usize,
    pub buys_added: usize,
    pub sells_added: usize,
}

/// Outcome of a run over every configured ticker.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub runs: Vec<TickerRun>,
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn orders_added(&self) -> usize {
        self.runs.iter().map(|r| r.buys_added + r.sells_added).sum()
    }
}

pub struct Pipeline {
    detector: Detector,
    store: Arc<dyn BucketStore>,
    /// `None` runs on the stored history only.
    source: Option<Arc<dyn HistorySource>>,
    max_days: i64,
}

impl Pipeline {
    pub fn new(
        detector: Detector,
        store: Arc<dyn BucketStore>,
        source: Option<Arc<dyn HistorySource>>,
        max_days: i64,
    ) -> Self {
        Self {
            detector,
            store,
            source,
            max_days,
        }
    }

    /// Brings the stored history of `ticker` up to `now`.
    ///
    /// Without stored history the last `max_days` are downloaded; otherwise only
    /// the bars after the newest stored one, merged by time with newer data winning.
    /// An empty download leaves the stored history untouched.
    pub async fn refresh_history(&self, ticker: &str, now: DateTime<Utc>) -> Result<HistoryRefresh, DetectorError> {
        let bucket = Bucket::History(ticker.to_string());
        let mut existing: Vec<Bar> = self.store.read(&bucket).await?;
        existing.sort_by_key(|b| b.timestamp);

        let Some(source) = &self.source else {
            return Ok(HistoryRefresh {
                downloaded: 0,
                total: existing.len(),
            });
        };

        let from = match existing.last() {
            Some(last) => last.timestamp + Duration::seconds(source.timeframe_secs()),
            None => now - Duration::days(self.max_days),
        };
        if from >= now {
            tracing::debug!(ticker, "History already up to date.");
            return Ok(HistoryRefresh {
                downloaded: 0,
                total: existing.len(),
            });
        }

        let downloaded = source.fetch_history(ticker, from, now).await?;
        if downloaded.is_empty() {
            tracing::debug!(ticker, %from, "No new history bars.");
            return Ok(HistoryRefresh {
                downloaded: 0,
                total: existing.len(),
            });
        }

        let count = downloaded.len();
        let mut merged: BTreeMap<i64, Bar> = existing.into_iter().map(|b| (b.timestamp.timestamp(), b)).collect();
        merged.extend(downloaded.into_iter().map(|b| (b.timestamp.timestamp(), b)));
        let bars: Vec<Bar> = merged.into_values().collect();
        self.store.overwrite(&bucket, &bars).await?;

        tracing::info!(ticker, downloaded = count, total = bars.len(), "History updated.");
        Ok(HistoryRefresh {
            downloaded: count,
            total: bars.len(),
        })
    }

    /// Refreshes history, recomputes and stores the levels, and merges new requests.
    pub async fn run_ticker(&self, ticker: &str, now: DateTime<Utc>) -> Result<TickerRun, DetectorError> {
        self.refresh_history(ticker, now).await?;

        let mut bars: Vec<Bar> = self.store.read(&Bucket::History(ticker.to_string())).await?;
        if bars.is_empty() {
            tracing::debug!(ticker, "No stored history; ticker skipped.");
            return Ok(TickerRun {
                ticker: ticker.to_string(),
                ..TickerRun::default()
            });
        }
        bars.sort_by_key(|b| b.timestamp);

        let detection = self.detector.detect(ticker, &bars)?;
        self.persist_levels(ticker, &detection).await?;

        let buys_added = merge_requests(&self.store, OrderSide::Buy, detection.buys).await?;
        let sells_added = merge_requests(&self.store, OrderSide::Sell, detection.sells).await?;
        if buys_added + sells_added > 0 {
            tracing::info!(ticker, buys_added, sells_added, "New limit orders requested.");
        }

        Ok(TickerRun {
            ticker: ticker.to_string(),
            bars: bars.len(),
            buys_added,
            sells_added,
        })
    }

    /// Runs every ticker. A failing ticker is logged and does not stop the rest.
    pub async fn run_all(&self, tickers: &[String], now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();
        for ticker in tickers {
            match self.run_ticker(ticker, now).await {
                Ok(run) => summary.runs.push(run),
                Err(e) => {
                    tracing::error!(ticker = %ticker, error = %e, "Detection failed for ticker.");
                    summary.failed.push(ticker.clone());
                }
            }
        }
        summary
    }

    async fn persist_levels(&self, ticker: &str, detection: &Detection) -> Result<(), DetectorError> {
        let t = ticker.to_string();
        let sets = [
            (Bucket::GlobalLevels(t.clone(), LevelKind::High), &detection.global_highs),
            (Bucket::GlobalLevels(t.clone(), LevelKind::Low), &detection.global_lows),
            (Bucket::LocalLevels(t.clone(), LevelKind::High), &detection.local_highs),
            (Bucket::LocalLevels(t, LevelKind::Low), &detection.local_lows),
        ];
        for (bucket, levels) in sets {
            self.store.overwrite(&bucket, levels).await?;
        }
        Ok(())
    }
}
