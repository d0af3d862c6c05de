use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("The request timed out: {0}")]
    Timeout(String),

    #[error("The HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("The API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),
}

impl ApiError {
    /// Timeouts are worth another attempt; every other failure is permanent for the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else if e.is_decode() {
            ApiError::Deserialization(e.to_string())
        } else {
            ApiError::Http(e)
        }
    }
}
