use core_types::{LevelKind, OrderSide, OrderStatus};
use std::fmt;
use std::path::PathBuf;

/// A named persisted collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Append-only order requests written by the detector and the CLI, one per side.
    Requests(OrderSide),
    /// Live and terminal order snapshots, one per status.
    Orders(OrderStatus),
    /// Stored bar history of a ticker.
    History(String),
    /// The unbroken global envelope of a ticker.
    GlobalLevels(String, LevelKind),
    /// The fine local extrema of a ticker.
    LocalLevels(String, LevelKind),
}

impl Bucket {
    /// The buckets holding full order records, live first.
    pub fn order_buckets() -> [Bucket; 4] {
        OrderStatus::ALL.map(Bucket::Orders)
    }

    /// Location of the bucket relative to the data directory.
    pub fn path(&self) -> PathBuf {
        match self {
            Bucket::Requests(OrderSide::Buy) => PathBuf::from("orders/ordersBuy.json"),
            Bucket::Requests(OrderSide::Sell) => PathBuf::from("orders/ordersSell.json"),
            Bucket::Orders(status) => {
                let name = match status {
                    OrderStatus::Pending => "pending",
                    OrderStatus::Filled => "active",
                    OrderStatus::TpClosed => "takeprofit",
                    OrderStatus::SlClosed => "stoploss",
                };
                PathBuf::from(format!("sim-history/{name}.json"))
            }
            Bucket::History(ticker) => PathBuf::from(format!("history/{ticker}_history.json")),
            Bucket::GlobalLevels(ticker, kind) => {
                let dir = match kind {
                    LevelKind::High => "donchian_highs",
                    LevelKind::Low => "donchian_lows",
                };
                PathBuf::from(format!("{dir}/{ticker}_{dir}.json"))
            }
            Bucket::LocalLevels(ticker, kind) => {
                let dir = match kind {
                    LevelKind::High => "history_highs",
                    LevelKind::Low => "history_lows",
                };
                PathBuf::from(format!("{dir}/{ticker}_{dir}.json"))
            }
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
