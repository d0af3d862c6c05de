use chrono::{DateTime, Utc};
use core_types::{Bar, CloseReason, FilledOrder, Order, OrderSide, OrderStatus};
use rust_decimal::Decimal;

/// A state change produced by [`advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub order_id: String,
    pub ticker: String,
    pub status: OrderStatus,
    pub price: Decimal,
    pub at: DateTime<Utc>,
}

/// The result of running one order over a batch of bars.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    pub order: Order,
    pub events: Vec<OrderEvent>,
}

impl Advance {
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Whether `bar` closes the filled order. The stop-loss is checked first, so it
/// wins when both brackets are inside the same bar.
pub fn close_reason(order: &FilledOrder, bar: &Bar) -> Option<CloseReason> {
    let terms = order.terms();
    let (stop_hit, target_hit) = match terms.side {
        OrderSide::Buy => (bar.low <= terms.stop_loss_price, bar.high >= terms.take_profit_price),
        OrderSide::Sell => (bar.high >= terms.stop_loss_price, bar.low <= terms.take_profit_price),
    };
    if stop_hit {
        Some(CloseReason::StopLoss)
    } else if target_hit {
        Some(CloseReason::TakeProfit)
    } else {
        None
    }
}

fn event(order: &Order, price: Decimal, at: DateTime<Utc>) -> OrderEvent {
    OrderEvent {
        order_id: order.id().to_string(),
        ticker: order.ticker().to_string(),
        status: order.status(),
        price,
        at,
    }
}

/// Runs an order through `bars` in time order.
///
/// Bars before the order's watch point (creation for pending orders, the fill
/// for filled ones) are ignored. A pending order fills at its limit price on the
/// first bar whose range contains it, and the same bar may already close it.
/// Once closed, the remaining bars are ignored. Closed orders come back unchanged.
pub fn advance(order: Order, bars: &[Bar]) -> Advance {
    let Some(watch_from) = order.watch_from() else {
        return Advance { order, events: Vec::new() };
    };

    let mut relevant: Vec<&Bar> = bars.iter().filter(|b| b.timestamp >= watch_from).collect();
    relevant.sort_by_key(|b| b.timestamp);

    let mut state = order;
    let mut events = Vec::new();

    for bar in relevant {
        state = match state {
            Order::Pending(pending) if bar.contains(pending.terms().limit_price) => {
                let filled: Order = pending.fill(bar.timestamp).into();
                let price = filled.entry_price().unwrap_or(bar.close);
                events.push(event(&filled, price, bar.timestamp));
                filled
            }
            other => other,
        };

        state = match state {
            Order::Filled(filled) => match close_reason(&filled, bar) {
                Some(reason) => {
                    let closed: Order = filled.close(reason, bar.timestamp).into();
                    let price = closed.exit_price().unwrap_or(bar.close);
                    events.push(event(&closed, price, bar.timestamp));
                    closed
                }
                None => Order::Filled(filled),
            },
            other => other,
        };

        if matches!(state, Order::Closed(_)) {
            break;
        }
    }

    Advance { order: state, events }
}
