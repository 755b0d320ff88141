//! Client error types.

use crate::config::ConfigError;
use tabledb_protocol::{SerialVersion, WireError};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timeout")]
    Timeout,

    #[error("table {table_name} did not reach a terminal state within {timeout_ms}ms")]
    WaitTimeout { table_name: String, timeout_ms: i64 },

    #[error("service rejected every serial version down to {0}")]
    VersionExhausted(SerialVersion),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Timeout => true,
            ClientError::Wire(e) => e.is_retryable(),
            _ => false,
        }
    }
}
