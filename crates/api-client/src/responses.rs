use core_types::Bar;
use serde::Deserialize;
use serde_json::Value;

/// Body of `GET /iss/engines/{engine}/markets/{market}/securities/{ticker}/candles.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MoexCandlesResponse {
    pub candles: MoexTable,
}

/// ISS tables are column names plus positional rows.
#[derive(Debug, Clone, Deserialize)]
pub struct MoexTable {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

impl MoexTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Body of `GET /md/v2/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Option<HistoryPayload>,
}

/// The history endpoint returns the candles either directly or wrapped.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HistoryPayload {
    List(Vec<Bar>),
    Wrapped {
        #[serde(default)]
        data: Option<Vec<Bar>>,
        #[serde(default)]
        candles: Option<Vec<Bar>>,
    },
}

impl HistoryResponse {
    pub fn into_bars(self) -> Vec<Bar> {
        match self.history {
            Some(HistoryPayload::List(bars)) => bars,
            Some(HistoryPayload::Wrapped { data, candles }) => data.or(candles).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}
