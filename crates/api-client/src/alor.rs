use crate::HistorySource;
use crate::error::ApiError;
use crate::responses::HistoryResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use configuration::HistorySettings;
use core_types::Bar;
use reqwest::header::{ACCEPT_ENCODING, HeaderMap, HeaderValue, USER_AGENT};

/// Historical bars from the broker's public market-data endpoint.
#[derive(Clone)]
pub struct AlorClient {
    client: reqwest::Client,
    base_url: String,
    exchange: String,
    board: String,
    timeframe_secs: i64,
}

impl AlorClient {
    pub fn new(settings: &HistorySettings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(USER_AGENT, HeaderValue::from_static("retest-history-client"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            exchange: settings.exchange.clone(),
            board: settings.board.clone(),
            timeframe_secs: settings.timeframe_secs,
        })
    }
}

#[async_trait]
impl HistorySource for AlorClient {
    fn timeframe_secs(&self) -> i64 {
        self.timeframe_secs
    }

    async fn fetch_history(&self, symbol: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Bar>, ApiError> {
        let url = format!("{}/md/v2/history", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("exchange", self.exchange.clone()),
                ("symbol", symbol.to_string()),
                ("board", self.board.clone()),
                ("tf", self.timeframe_secs.to_string()),
                ("from", from.timestamp().to_string()),
                ("to", to.timestamp().to_string()),
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

        let mut bars = response.json::<HistoryResponse>().await?.into_bars();
        bars.sort_by_key(|b| b.timestamp);
        tracing::debug!(symbol, count = bars.len(), "History downloaded.");
        Ok(bars)
    }
}
