//! Error types for the off-chain review store.

use thiserror::Error;

/// Errors that can occur while talking to the review store.
#[derive(Debug, Error)]
pub enum OffchainError {
    /// Transport failure (DNS, connect, timeout).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Store is unavailable (used by the in-memory store to simulate outages).
    #[error("Review store unavailable")]
    Unavailable,

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid review payload.
    #[error("Invalid review: {0}")]
    Core(#[from] modelrep_core::CoreError),
}

impl OffchainError {
    /// Whether repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OffchainError::NetworkError(_) | OffchainError::Unavailable => true,
            OffchainError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type alias for off-chain operations.
pub type Result<T> = std::result::Result<T, OffchainError>;
