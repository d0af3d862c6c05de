pub mod enums;
pub mod error;
pub mod order;
pub mod record;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{CloseReason, LevelKind, OrderSide, OrderStatus};
pub use error::CoreError;
pub use order::{ClosedOrder, FilledOrder, Order, OrderTerms, PendingOrder, pnl_percent};
pub use record::{OrderRecord, OrderRequestRecord, OrderSubmission};
pub use structs::{Bar, ExtremeLevel};
