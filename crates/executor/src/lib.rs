//! # Retest Executor Crate
//!
//! Simulated execution of limit orders against bar data.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** `advance` is a pure function from an order and
//!   a bar slice to the order's next state. `OrderStore` is the only owner of the
//!   order book and the only component that persists it.
//! - **Forward-only lifecycle:** orders move `PENDING -> FILLED -> TP_CLOSED | SL_CLOSED`
//!   and the store refuses any update that would move one backward.
//!
//! ## Public API
//!
//! - `advance`: the fill/close state machine.
//! - `OrderStore` / `OrderBook`: the authoritative order collections.
//! - `ExecutorError`: the specific error types that can be returned from this crate.

pub mod error;
pub mod fill;
pub mod store;

pub use error::ExecutorError;
pub use fill::{Advance, OrderEvent, advance, close_reason};
pub use store::{OrderBook, OrderStore, PersistReport};
