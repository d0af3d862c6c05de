use crate::enums::{CloseReason, OrderSide, OrderStatus};
use crate::error::CoreError;
use crate::order::{ClosedOrder, FilledOrder, Order, OrderTerms, PendingOrder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_quantity() -> u32 {
    1
}

/// The flat, persisted form of an [`Order`], as stored in the live and terminal buckets.
///
/// Legacy field names (`priceBuy`, `priceSell`, `takeProfit`, `stopLoss`, `qty`, `pnl`)
/// are accepted when reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: String,
    pub ticker: String,
    pub side: OrderSide,
    #[serde(alias = "priceBuy", alias = "priceSell")]
    pub limit_price: Decimal,
    #[serde(alias = "takeProfit")]
    pub take_profit_price: Decimal,
    #[serde(alias = "stopLoss")]
    pub stop_loss_price: Decimal,
    #[serde(default = "default_quantity", alias = "qty")]
    pub quantity: u32,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Decimal>,
    #[serde(default, alias = "pnl", skip_serializing_if = "Option::is_none")]
    pub pnl_percent: Option<Decimal>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub filled_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub closed_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    fn terms(&self) -> OrderTerms {
        OrderTerms {
            id: self.id.clone(),
            ticker: self.ticker.clone(),
            side: self.side,
            limit_price: self.limit_price,
            take_profit_price: self.take_profit_price,
            stop_loss_price: self.stop_loss_price,
            quantity: self.quantity,
            created_at: self.created_at,
        }
    }

    /// Names of the fields `status` expects but the record lacks.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.status == OrderStatus::Pending {
            return missing;
        }
        if self.entry_price.is_none() {
            missing.push("entryPrice");
        }
        if self.filled_at.is_none() {
            missing.push("filledAt");
        }
        if self.status.is_terminal() {
            if self.exit_price.is_none() {
                missing.push("exitPrice");
            }
            if self.closed_at.is_none() {
                missing.push("closedAt");
            }
        }
        missing
    }
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        let t = order.terms();
        let (filled_at, closed_at) = match order {
            Order::Pending(_) => (None, None),
            Order::Filled(o) => (Some(o.filled_at()), None),
            Order::Closed(o) => (Some(o.filled_at()), Some(o.closed_at())),
        };
        Self {
            id: t.id.clone(),
            ticker: t.ticker.clone(),
            side: t.side,
            limit_price: t.limit_price,
            take_profit_price: t.take_profit_price,
            stop_loss_price: t.stop_loss_price,
            quantity: t.quantity,
            status: order.status(),
            entry_price: order.entry_price(),
            exit_price: order.exit_price(),
            pnl_percent: order.pnl_percent(),
            created_at: t.created_at,
            filled_at,
            closed_at,
        }
    }
}

/// Rebuilds the state-tagged order, defaulting what an incomplete record lacks.
///
/// Orders only ever fill at their limit and close at a bracket, so a missing
/// entry is the limit price and a missing exit is the bracket the status names.
/// Missing times fall back to the previous step of the lifecycle.
impl From<OrderRecord> for Order {
    fn from(record: OrderRecord) -> Self {
        let terms = record.terms();
        let entry = record.entry_price.unwrap_or(record.limit_price);
        let filled_at = record.filled_at.unwrap_or(record.created_at);
        let reason = match record.status {
            OrderStatus::Pending => return PendingOrder::new(terms).into(),
            OrderStatus::Filled => return FilledOrder::restore(terms, entry, filled_at).into(),
            OrderStatus::TpClosed => CloseReason::TakeProfit,
            OrderStatus::SlClosed => CloseReason::StopLoss,
        };
        let exit = record.exit_price.unwrap_or(match reason {
            CloseReason::TakeProfit => record.take_profit_price,
            CloseReason::StopLoss => record.stop_loss_price,
        });
        let closed_at = record.closed_at.unwrap_or(filled_at);
        ClosedOrder::restore(terms, entry, filled_at, exit, closed_at, record.pnl_percent, reason).into()
    }
}

/// One entry of a pending-request bucket. The side is implied by the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ticker: String,
    #[serde(alias = "priceBuy", alias = "priceSell")]
    pub limit_price: Decimal,
    #[serde(alias = "takeProfit")]
    pub take_profit_price: Decimal,
    #[serde(alias = "stopLoss")]
    pub stop_loss_price: Decimal,
    #[serde(default, alias = "qty", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderRequestRecord {
    /// The record's id, or one derived from side, ticker and limit price.
    ///
    /// Requests are unique per (ticker, limit price) within a side bucket, so the
    /// derived id is stable across restarts and repeated reads.
    pub fn order_id(&self, side: OrderSide) -> String {
        match &self.id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => format!("{:?}-{}-{}", side, self.ticker, self.limit_price.normalize()).to_uppercase(),
        }
    }

    /// Turns the request into order terms, filling in the defaults:
    /// a derived id, quantity 1 and `now` as the creation time.
    pub fn into_terms(self, side: OrderSide, now: DateTime<Utc>) -> OrderTerms {
        OrderTerms {
            id: self.order_id(side),
            ticker: self.ticker,
            side,
            limit_price: self.limit_price,
            take_profit_price: self.take_profit_price,
            stop_loss_price: self.stop_loss_price,
            quantity: self.quantity.unwrap_or_else(default_quantity),
            created_at: self.created_at.unwrap_or(now),
        }
    }
}

/// An order entered through the submission interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub side: OrderSide,
    pub ticker: String,
    pub limit_price: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl OrderSubmission {
    /// Checks that the brackets sit on the correct sides of the limit price.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: &str| Err(CoreError::InvalidInput("submission".to_string(), msg.to_string()));

        if self.ticker.trim().is_empty() {
            return invalid("ticker must not be empty");
        }
        if self.quantity == 0 {
            return invalid("quantity must be greater than 0");
        }
        if self.limit_price <= Decimal::ZERO
            || self.take_profit_price <= Decimal::ZERO
            || self.stop_loss_price <= Decimal::ZERO
        {
            return invalid("prices must be greater than 0");
        }
        let ordered = match self.side {
            OrderSide::Buy => {
                self.stop_loss_price < self.limit_price && self.limit_price < self.take_profit_price
            }
            OrderSide::Sell => {
                self.take_profit_price < self.limit_price && self.limit_price < self.stop_loss_price
            }
        };
        if !ordered {
            return invalid("take-profit and stop-loss must bracket the limit price for this side");
        }
        Ok(())
    }

    pub fn into_terms(self, now: DateTime<Utc>) -> OrderTerms {
        OrderTerms {
            id: Uuid::new_v4().to_string(),
            ticker: self.ticker,
            side: self.side,
            limit_price: self.limit_price,
            take_profit_price: self.take_profit_price,
            stop_loss_price: self.stop_loss_price,
            quantity: self.quantity,
            created_at: now,
        }
    }

    /// The request-bucket form of this submission, with a freshly assigned id,
    /// created at `now`.
    pub fn into_request(self, now: DateTime<Utc>) -> OrderRequestRecord {
        OrderRequestRecord {
            id: Some(Uuid::new_v4().to_string()),
            ticker: self.ticker,
            limit_price: self.limit_price,
            take_profit_price: self.take_profit_price,
            stop_loss_price: self.stop_loss_price,
            quantity: Some(self.quantity),
            created_at: Some(now),
        }
    }
}
