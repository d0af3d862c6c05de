//! # Retest Engine
//!
//! The periodic driver of the simulated order book.
//!
//! ## Architectural Principles
//!
//! - **One writer:** the `OrderStore` lives behind a single `tokio::sync::Mutex`. A tick
//!   holds it from the first read to the final save, and `OrderDesk` submissions take
//!   the same lock, so no update is lost between the two.
//! - **Injectable time:** the scheduler asks a `Clock` for "now", so tests drive ticks
//!   with a `ManualClock` instead of a real timer.
//!
//! ## Public API
//!
//! - `Scheduler`: tick logic, checkpoint and run loop.
//! - `OrderDesk`: the in-process order submission handle.
//! - `Clock`, `SystemClock`, `ManualClock`.

pub mod clock;
pub mod desk;
pub mod error;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use desk::OrderDesk;
pub use error::EngineError;
pub use scheduler::{Scheduler, TickReport};
