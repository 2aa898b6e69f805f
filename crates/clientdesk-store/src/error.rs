//! Store Error Types

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Row-store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store rejected the request (bad filter, constraint violation, ...)
    #[error("Query failed with status {status}: {message}")]
    Query { status: u16, message: String },

    /// Could not reach the store at all
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    /// Row could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unreachable(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unreachable(err.to_string())
    }
}
