use crate::BarSource;
use crate::error::ApiError;
use crate::responses::{MoexCandlesResponse, MoexTable};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use configuration::BarSourceSettings;
use core_types::Bar;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

const ISS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ISS_QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Live candles from the exchange's ISS endpoint.
#[derive(Clone)]
pub struct MoexClient {
    client: reqwest::Client,
    base_url: String,
    engine: String,
    market: String,
    interval: u32,
    max_attempts: u32,
    retry_backoff: Duration,
    exchange_tz: FixedOffset,
}

impl MoexClient {
    pub fn new(settings: &BarSourceSettings) -> Result<Self, ApiError> {
        let exchange_tz = FixedOffset::east_opt(settings.exchange_utc_offset_hours * 3600).ok_or_else(|| {
            ApiError::InvalidData(format!(
                "Invalid exchange UTC offset: {}h",
                settings.exchange_utc_offset_hours
            ))
        })?;
        let client = reqwest::Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            engine: settings.engine.clone(),
            market: settings.market.clone(),
            interval: settings.interval,
            max_attempts: settings.max_attempts.max(1),
            retry_backoff: settings.retry_backoff(),
            exchange_tz,
        })
    }

    async fn fetch_ticker(&self, ticker: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Bar>, ApiError> {
        let url = format!(
            "{}/iss/engines/{}/markets/{}/securities/{}/candles.json",
            self.base_url, self.engine, self.market, ticker
        );
        let from_local = from.with_timezone(&self.exchange_tz).format(ISS_QUERY_FORMAT).to_string();
        let till_local = to.with_timezone(&self.exchange_tz).format(ISS_QUERY_FORMAT).to_string();
        let interval = self.interval.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("from", from_local.as_str()),
                ("till", till_local.as_str()),
                ("interval", interval.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: MoexCandlesResponse = response.json().await?;
        let bars = parse_candles(&body.candles, self.exchange_tz)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.timestamp >= from && b.timestamp < to)
            .collect())
    }
}

#[async_trait]
impl BarSource for MoexClient {
    async fn fetch(
        &self,
        tickers: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<Bar>>, ApiError> {
        let requests = tickers.iter().map(|ticker| async move {
            let result = with_retry(ticker, self.max_attempts, self.retry_backoff, || {
                self.fetch_ticker(ticker, from, to)
            })
            .await;
            (ticker, result)
        });

        let mut bars = HashMap::new();
        for (ticker, result) in join_all(requests).await {
            match result {
                Ok(ticker_bars) => {
                    bars.insert(ticker.clone(), ticker_bars);
                }
                Err(e) => tracing::warn!(ticker = %ticker, error = %e, "Candle fetch failed; ticker skipped this tick."),
            }
        }

        if bars.len() < tickers.len() {
            tracing::warn!(
                received = bars.len(),
                requested = tickers.len(),
                "Candle data incomplete for this window."
            );
        }
        Ok(bars)
    }
}

/// Runs `op` up to `max_attempts` times, retrying only transient failures.
pub(crate) async fn with_retry<T, F, Fut>(
    ticker: &str,
    max_attempts: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::debug!(ticker, attempt, max_attempts, error = %e, "Transient failure, retrying.");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Converts an ISS candle table into bars. `begin` is exchange-local time.
pub fn parse_candles(table: &MoexTable, exchange_tz: FixedOffset) -> Result<Vec<Bar>, ApiError> {
    let column = |name: &str| {
        table.column(name).ok_or_else(|| {
            ApiError::InvalidData(format!(
                "missing column '{}' (columns: {})",
                name,
                table.columns.join(", ")
            ))
        })
    };
    let (bi, hi, li, ci) = (column("begin")?, column("high")?, column("low")?, column("close")?);
    let oi = table.column("open");
    let vi = table.column("volume");

    let mut bars = table
        .data
        .iter()
        .map(|row| {
            let cell = |i: usize| row.get(i).ok_or_else(|| ApiError::InvalidData(format!("short row: {row:?}")));
            let begin = cell(bi)?
                .as_str()
                .ok_or_else(|| ApiError::InvalidData(format!("non-text begin in row: {row:?}")))?;
            let naive = NaiveDateTime::parse_from_str(begin, ISS_TIME_FORMAT)
                .map_err(|e| ApiError::InvalidData(format!("bad begin '{begin}': {e}")))?;
            let timestamp = exchange_tz
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| ApiError::InvalidData(format!("ambiguous begin '{begin}'")))?
                .with_timezone(&Utc);

            Ok(Bar {
                timestamp,
                open: oi.and_then(|i| row.get(i)).and_then(decimal_cell),
                high: decimal_cell(cell(hi)?).ok_or_else(|| ApiError::InvalidData(format!("bad high in {row:?}")))?,
                low: decimal_cell(cell(li)?).ok_or_else(|| ApiError::InvalidData(format!("bad low in {row:?}")))?,
                close: decimal_cell(cell(ci)?).ok_or_else(|| ApiError::InvalidData(format!("bad close in {row:?}")))?,
                volume: vi.and_then(|i| row.get(i)).and_then(decimal_cell),
            })
        })
        .collect::<Result<Vec<Bar>, ApiError>>()?;

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

fn decimal_cell(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}
