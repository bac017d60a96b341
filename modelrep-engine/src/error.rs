//! Error types for the engine drivers.

use thiserror::Error;

/// Errors returned by the orchestrator, aggregator and review feed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Another submission is still running in this session.
    #[error("A rating submission is already in progress")]
    SubmissionInFlight,

    /// Model is not part of the loaded view.
    #[error("Unknown model: {0}")]
    UnknownModel(u64),

    /// Rejected input or state transition.
    #[error(transparent)]
    Core(#[from] modelrep_core::CoreError),

    /// Ledger failure.
    #[error("Ledger error: {0}")]
    Chain(#[from] modelrep_chain::ChainError),

    /// Review store failure.
    #[error("Review store error: {0}")]
    Offchain(#[from] modelrep_offchain::OffchainError),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
