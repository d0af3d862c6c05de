use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Failed to read order history: {0}")]
    Storage(#[from] StorageError),

    #[error("Error in calculation: {0}")]
    Calculation(String),
}
