use crate::clock::Clock;
use crate::error::EngineError;
use core_types::{Order, OrderStatus, OrderSubmission};
use executor::OrderStore;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Submits orders into the running book.
///
/// Shares the scheduler's lock, so a submission lands either before a tick
/// reads the book or after it has been saved.
#[derive(Clone)]
pub struct OrderDesk {
    store: Arc<Mutex<OrderStore>>,
    clock: Arc<dyn Clock>,
}

impl OrderDesk {
    pub fn new(store: Arc<Mutex<OrderStore>>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Adds the order as PENDING, created now, persists it and returns its id.
    pub async fn submit(&self, submission: OrderSubmission) -> Result<String, EngineError> {
        let now = self.clock.now();
        let mut store = self.store.lock().await;
        Ok(store.add(submission, now).await?)
    }

    pub async fn snapshot(&self, status: OrderStatus) -> Vec<Order> {
        self.store.lock().await.snapshot(status)
    }
}
