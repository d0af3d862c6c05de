use core_types::CoreError;
use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order id '{0}' already exists")]
    DuplicateOrder(String),

    #[error("Order '{0}' cannot change without changing status")]
    ConflictingUpdate(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Failed to persist orders: {0}")]
    Storage(#[from] StorageError),
}
