//! Turning retests into bracketed limit-order requests.

use crate::error::DetectorError;
use crate::retest::Retest;
use core_types::{LevelKind, OrderRequestRecord, OrderSide};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use std::sync::Arc;
use storage::{Bucket, BucketStore, BucketStoreExt};
use uuid::Uuid;

/// Rounds up to two decimal places.
pub fn ceil2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity)
}

/// Rounds down to two decimal places.
pub fn floor2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity)
}

/// Take-profit and stop-loss distances as fractions of the limit price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketRule {
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
}

/// A limit order proposed by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOrder {
    pub side: OrderSide,
    pub request: OrderRequestRecord,
}

/// Builds the order request for a retested level.
///
/// Resistance retests become buy limits, support retests sell limits, both at
/// the level price. Both brackets round to two decimals away from the entry.
pub fn synthesize_order(ticker: &str, retest: &Retest, rule: &BracketRule) -> CandidateOrder {
    let limit = retest.level.price;
    let side = retest.level.kind.order_side();
    let (take_profit, stop_loss) = match retest.level.kind {
        LevelKind::High => (
            ceil2(limit * (Decimal::ONE + rule.take_profit_pct)),
            floor2(limit * (Decimal::ONE - rule.stop_loss_pct)),
        ),
        LevelKind::Low => (
            floor2(limit * (Decimal::ONE - rule.take_profit_pct)),
            ceil2(limit * (Decimal::ONE + rule.stop_loss_pct)),
        ),
    };

    CandidateOrder {
        side,
        request: OrderRequestRecord {
            id: Some(Uuid::new_v4().to_string()),
            ticker: ticker.to_string(),
            limit_price: limit,
            take_profit_price: take_profit,
            stop_loss_price: stop_loss,
            quantity: None,
            created_at: None,
        },
    }
}

/// Drops repeated limit prices, keeping the first occurrence.
pub fn dedupe_by_limit(requests: Vec<OrderRequestRecord>) -> Vec<OrderRequestRecord> {
    let mut seen = HashSet::new();
    requests
        .into_iter()
        .filter(|r| seen.insert((r.ticker.clone(), r.limit_price.normalize())))
        .collect()
}

/// Appends the requests whose (ticker, limit price) is new to the side's request bucket.
///
/// Existing entries are never altered or removed. Returns how many were added.
pub async fn merge_requests(
    store: &Arc<dyn BucketStore>,
    side: OrderSide,
    requests: Vec<OrderRequestRecord>,
) -> Result<usize, DetectorError> {
    let unique = dedupe_by_limit(requests);
    if unique.is_empty() {
        return Ok(0);
    }
    let added = store
        .append_merge(&Bucket::Requests(side), &unique, |r: &OrderRequestRecord| {
            (r.ticker.clone(), r.limit_price.normalize())
        })
        .await?;
    Ok(added)
}
