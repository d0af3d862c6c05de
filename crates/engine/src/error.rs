use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Bar source error: {0}")]
    BarSource(#[from] api_client::error::ApiError),

    #[error("Order store error: {0}")]
    Executor(#[from] executor::ExecutorError),
}
