//! State-tagged simulated orders.
//!
//! An order is one of three shapes, each carrying exactly the fields its state
//! allows: a [`PendingOrder`] has only its terms, a [`FilledOrder`] adds the entry,
//! a [`ClosedOrder`] adds the exit and PnL. The only way to get from one shape to
//! the next is the consuming transition method, so an entry or exit price can
//! never be set twice or set out of order.

use crate::enums::{CloseReason, OrderSide, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// The immutable part of an order, fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerms {
    pub id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub limit_price: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// PnL of a round trip in percent of the entry price, signed by side.
///
/// Returns zero when the entry price is zero rather than dividing by it.
pub fn pnl_percent(side: OrderSide, entry_price: Decimal, exit_price: Decimal) -> Decimal {
    (exit_price - entry_price)
        .checked_div(entry_price)
        .map(|ratio| ratio * Decimal::ONE_HUNDRED * side.direction())
        .unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    terms: OrderTerms,
}

impl PendingOrder {
    pub fn new(terms: OrderTerms) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &OrderTerms {
        &self.terms
    }

    /// Fills the limit order at its limit price.
    pub fn fill(self, filled_at: DateTime<Utc>) -> FilledOrder {
        let entry_price = self.terms.limit_price;
        FilledOrder {
            terms: self.terms,
            entry_price,
            filled_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilledOrder {
    terms: OrderTerms,
    entry_price: Decimal,
    filled_at: DateTime<Utc>,
}

impl FilledOrder {
    /// Rebuilds a filled order from persisted state.
    pub fn restore(terms: OrderTerms, entry_price: Decimal, filled_at: DateTime<Utc>) -> Self {
        Self {
            terms,
            entry_price,
            filled_at,
        }
    }

    pub fn terms(&self) -> &OrderTerms {
        &self.terms
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn filled_at(&self) -> DateTime<Utc> {
        self.filled_at
    }

    /// Closes the position at the bracket price matching `reason`.
    pub fn close(self, reason: CloseReason, closed_at: DateTime<Utc>) -> ClosedOrder {
        let exit_price = match reason {
            CloseReason::TakeProfit => self.terms.take_profit_price,
            CloseReason::StopLoss => self.terms.stop_loss_price,
        };
        let pnl = pnl_percent(self.terms.side, self.entry_price, exit_price);
        ClosedOrder {
            terms: self.terms,
            entry_price: self.entry_price,
            filled_at: self.filled_at,
            exit_price,
            closed_at,
            pnl_percent: pnl,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedOrder {
    terms: OrderTerms,
    entry_price: Decimal,
    filled_at: DateTime<Utc>,
    exit_price: Decimal,
    closed_at: DateTime<Utc>,
    pnl_percent: Decimal,
    reason: CloseReason,
}

impl ClosedOrder {
    /// Rebuilds a closed order from persisted state. A missing PnL is recomputed.
    pub fn restore(
        terms: OrderTerms,
        entry_price: Decimal,
        filled_at: DateTime<Utc>,
        exit_price: Decimal,
        closed_at: DateTime<Utc>,
        pnl: Option<Decimal>,
        reason: CloseReason,
    ) -> Self {
        let pnl_percent = pnl.unwrap_or_else(|| pnl_percent(terms.side, entry_price, exit_price));
        Self {
            terms,
            entry_price,
            filled_at,
            exit_price,
            closed_at,
            pnl_percent,
            reason,
        }
    }

    pub fn terms(&self) -> &OrderTerms {
        &self.terms
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn filled_at(&self) -> DateTime<Utc> {
        self.filled_at
    }

    pub fn exit_price(&self) -> Decimal {
        self.exit_price
    }

    pub fn closed_at(&self) -> DateTime<Utc> {
        self.closed_at
    }

    pub fn pnl_percent(&self) -> Decimal {
        self.pnl_percent
    }

    pub fn reason(&self) -> CloseReason {
        self.reason
    }
}

/// A simulated order in any lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Pending(PendingOrder),
    Filled(FilledOrder),
    Closed(ClosedOrder),
}

impl Order {
    pub fn terms(&self) -> &OrderTerms {
        match self {
            Order::Pending(o) => o.terms(),
            Order::Filled(o) => o.terms(),
            Order::Closed(o) => o.terms(),
        }
    }

    pub fn id(&self) -> &str {
        &self.terms().id
    }

    pub fn ticker(&self) -> &str {
        &self.terms().ticker
    }

    pub fn side(&self) -> OrderSide {
        self.terms().side
    }

    pub fn status(&self) -> OrderStatus {
        match self {
            Order::Pending(_) => OrderStatus::Pending,
            Order::Filled(_) => OrderStatus::Filled,
            Order::Closed(o) => o.reason().status(),
        }
    }

    pub fn entry_price(&self) -> Option<Decimal> {
        match self {
            Order::Pending(_) => None,
            Order::Filled(o) => Some(o.entry_price()),
            Order::Closed(o) => Some(o.entry_price()),
        }
    }

    pub fn exit_price(&self) -> Option<Decimal> {
        match self {
            Order::Closed(o) => Some(o.exit_price()),
            _ => None,
        }
    }

    pub fn pnl_percent(&self) -> Option<Decimal> {
        match self {
            Order::Closed(o) => Some(o.pnl_percent()),
            _ => None,
        }
    }

    /// The earliest bar time that is still relevant to this order, if it is live.
    pub fn watch_from(&self) -> Option<DateTime<Utc>> {
        match self {
            Order::Pending(o) => Some(o.terms().created_at),
            Order::Filled(o) => Some(o.filled_at()),
            Order::Closed(_) => None,
        }
    }
}

impl From<PendingOrder> for Order {
    fn from(o: PendingOrder) -> Self {
        Order::Pending(o)
    }
}

impl From<FilledOrder> for Order {
    fn from(o: FilledOrder) -> Self {
        Order::Filled(o)
    }
}

impl From<ClosedOrder> for Order {
    fn from(o: ClosedOrder) -> Self {
        Order::Closed(o)
    }
}
