use api_client::error::ApiError;
use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Detector received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("An error occurred during indicator calculation: {0}")]
    IndicatorError(String),

    #[error("History download failed: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
