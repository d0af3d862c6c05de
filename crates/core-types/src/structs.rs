use crate::enums::LevelKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLC aggregate. Bars of a ticker are ordered by `timestamp` ascending.
///
/// Persisted history uses the exchange's field names, with `time` in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(rename = "time", with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            timestamp,
            open: None,
            high,
            low,
            close,
            volume: None,
        }
    }

    /// True when `price` lies inside the bar's `[low, high]` range.
    pub fn contains(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

/// A price confirmed as the extreme of its trailing window at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtremeLevel {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    #[serde(alias = "value")]
    pub price: Decimal,
    pub kind: LevelKind,
}

impl ExtremeLevel {
    pub fn new(time: DateTime<Utc>, price: Decimal, kind: LevelKind) -> Self {
        Self { time, price, kind }
    }

    /// Identity used to recognise the same point in two level sets.
    pub fn key(&self) -> (i64, Decimal) {
        (self.time.timestamp(), self.price.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn bar_contains_is_inclusive_on_both_ends() {
        let bar = Bar::new(Utc.timestamp_opt(0, 0).unwrap(), dec!(101), dec!(99), dec!(100));
        assert!(bar.contains(dec!(99)));
        assert!(bar.contains(dec!(101)));
        assert!(!bar.contains(dec!(101.01)));
    }

    #[test]
    fn bar_reads_exchange_history_format() {
        let json = r#"{"time":1700000000,"open":10.5,"high":11,"low":10,"close":10.8,"volume":1200}"#;
        let bar: Bar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(bar.high, dec!(11));
        assert_eq!(bar.open, Some(dec!(10.5)));
    }

    #[test]
    fn level_key_ignores_trailing_zeros() {
        let t = Utc.timestamp_opt(1000, 0).unwrap();
        let a = ExtremeLevel::new(t, dec!(150.0), LevelKind::High);
        let b = ExtremeLevel::new(t, dec!(150), LevelKind::High);
        assert_eq!(a.key(), b.key());
    }
}
