use crate::error::AnalyticsError;
use chrono::{DateTime, Utc};
use core_types::{OrderRecord, OrderSide, OrderStatus, pnl_percent};
use rust_decimal::Decimal;
use std::collections::HashSet;
use storage::{Bucket, BucketStore, BucketStoreExt};

/// A closed order, reduced to what the statistics need.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub pnl_percent: Decimal,
    pub closed_at: DateTime<Utc>,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.status == OrderStatus::TpClosed
    }

    fn from_record(record: &OrderRecord) -> Option<Self> {
        if !record.status.is_terminal() {
            return None;
        }
        let pnl = record.pnl_percent.or_else(|| match (record.entry_price, record.exit_price) {
            (Some(entry), Some(exit)) if !entry.is_zero() => Some(pnl_percent(record.side, entry, exit)),
            _ => None,
        });
        let (Some(pnl), Some(closed_at)) = (pnl, record.closed_at) else {
            tracing::warn!(order_id = %record.id, status = %record.status, "Closed order lacks PnL or close time.");
            return None;
        };
        Some(Self {
            id: record.id.clone(),
            ticker: record.ticker.clone(),
            side: record.side,
            status: record.status,
            pnl_percent: pnl,
            closed_at,
        })
    }
}

/// The closed trades among `records`, once per id, ordered by close time.
///
/// The first record seen for an id wins.
pub fn closed_trades(records: &[OrderRecord]) -> Vec<ClosedTrade> {
    let mut seen = HashSet::new();
    let mut trades: Vec<ClosedTrade> = records
        .iter()
        .filter_map(ClosedTrade::from_record)
        .filter(|t| seen.insert(t.id.clone()))
        .collect();
    trades.sort_by(|a, b| a.closed_at.cmp(&b.closed_at).then_with(|| a.id.cmp(&b.id)));
    trades
}

/// Reads every order bucket and returns the closed trades found in them.
pub async fn load_closed_trades(store: &dyn BucketStore) -> Result<Vec<ClosedTrade>, AnalyticsError> {
    let mut records: Vec<OrderRecord> = Vec::new();
    for bucket in Bucket::order_buckets() {
        records.extend(store.read::<OrderRecord>(&bucket).await?);
    }
    Ok(closed_trades(&records))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    pub(crate) fn closed(id: &str, status: OrderStatus, pnl: Option<Decimal>, closed_secs: i64) -> OrderRecord {
        OrderRecord {
            id: id.to_string(),
            ticker: "SBER".to_string(),
            side: OrderSide::Buy,
            limit_price: dec!(100),
            take_profit_price: dec!(102),
            stop_loss_price: dec!(99.5),
            quantity: 1,
            status,
            entry_price: Some(dec!(100)),
            exit_price: Some(match status {
                OrderStatus::TpClosed => dec!(102),
                _ => dec!(99.5),
            }),
            pnl_percent: pnl,
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            filled_at: Some(Utc.timestamp_opt(0, 0).unwrap()),
            closed_at: Some(Utc.timestamp_opt(closed_secs, 0).unwrap()),
        }
    }

    #[test]
    fn duplicates_and_live_records_are_ignored() {
        let mut live = closed("live", OrderStatus::Filled, None, 0);
        live.closed_at = None;
        let records = vec![
            closed("b", OrderStatus::TpClosed, Some(dec!(2)), 200),
            closed("a", OrderStatus::SlClosed, Some(dec!(-0.5)), 100),
            closed("b", OrderStatus::TpClosed, Some(dec!(2)), 200),
            live,
        ];
        let trades = closed_trades(&records);
        let ids: Vec<&str> = trades.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn missing_pnl_is_derived_from_prices() {
        let trades = closed_trades(&[closed("a", OrderStatus::TpClosed, None, 100)]);
        assert_eq!(trades[0].pnl_percent, dec!(2));
        assert!(trades[0].is_win());
    }
}
