use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Invalid order state transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: crate::OrderStatus,
        to: crate::OrderStatus,
    },
}
