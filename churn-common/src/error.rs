//! Common error types for the churn workspace

use thiserror::Error;

/// Common result type for churn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the trainer and the inference service.
///
/// Every variant is terminal for the current run or request.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration key
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset or record value outside what the transformations accept
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Model artifact could not be written, read or decoded
    #[error("Model persistence error: {0}")]
    ModelPersistence(String),

    /// Inference input missing a required key or carrying the wrong type
    #[error("Input schema error: {0}")]
    InputSchema(String),

    /// A training stage cannot run on the data it was given
    #[error("Training error: {0}")]
    Training(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InputSchema(_) | Error::DataFormat(_))
    }
}
