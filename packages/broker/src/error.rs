//! Broker and transport errors.

use db::DbError;
use dispatch_core::ResultError;

/// Error type for broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),

    #[error("Broker call timed out")]
    Timeout,

    #[error("Actor error: {0}")]
    Actor(String),
}

impl From<BrokerError> for ResultError {
    fn from(value: BrokerError) -> Self {
        ResultError::internal(value.to_string())
    }
}
