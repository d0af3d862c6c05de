use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side of the order
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// +1 for longs, -1 for shorts. Multiplies a raw price move into a PnL move.
    pub fn direction(&self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Lifecycle status of a simulated order.
///
/// Transitions are strictly forward: `Pending -> Filled -> {TpClosed | SlClosed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    TpClosed,
    SlClosed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Filled,
        OrderStatus::TpClosed,
        OrderStatus::SlClosed,
    ];

    /// Live orders are still evaluated by the scheduler.
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Filled)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    /// Position in the lifecycle; both terminal states share the last stage.
    pub fn stage(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Filled => 1,
            OrderStatus::TpClosed | OrderStatus::SlClosed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only lifecycle.
    /// Staying in the same status is allowed.
    pub fn can_become(&self, next: OrderStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            OrderStatus::Pending => next == OrderStatus::Filled,
            OrderStatus::Filled => next.is_terminal(),
            OrderStatus::TpClosed | OrderStatus::SlClosed => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::TpClosed => "TP_CLOSED",
            OrderStatus::SlClosed => "SL_CLOSED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "FILLED" => Ok(OrderStatus::Filled),
            "TP_CLOSED" => Ok(OrderStatus::TpClosed),
            "SL_CLOSED" => Ok(OrderStatus::SlClosed),
            other => Err(crate::CoreError::InvalidInput(
                "status".to_string(),
                other.to_string(),
            )),
        }
    }
}

/// Why a filled order was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
}

impl CloseReason {
    pub fn status(&self) -> OrderStatus {
        match self {
            CloseReason::TakeProfit => OrderStatus::TpClosed,
            CloseReason::StopLoss => OrderStatus::SlClosed,
        }
    }
}

/// Which side of the range an extreme level was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelKind {
    High,
    Low,
}

impl LevelKind {
    /// Resistance levels produce buy-limit retests, support levels sell-limit retests.
    pub fn order_side(&self) -> OrderSide {
        match self {
            LevelKind::High => OrderSide::Buy,
            LevelKind::Low => OrderSide::Sell,
        }
    }
}
