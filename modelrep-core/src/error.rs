//! Error types for the modelrep core library.
//!
//! This module defines all error types that can occur during
//! input validation and submission state transitions.

use thiserror::Error;

use crate::submission::SubmissionStep;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Score outside the 1..=5 star range.
    #[error("Invalid score: {0}. Must be between 1 and 5")]
    InvalidScore(u8),

    /// Review comment exceeds the character limit.
    #[error("Comment too long: {len} characters (max {max})")]
    CommentTooLong {
        /// Length of the rejected comment, in characters
        len: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// Tag is not part of the review vocabulary.
    #[error("Unknown review tag: '{0}'")]
    UnknownTag(String),

    /// Event is not accepted in the current submission step.
    #[error("Invalid transition: '{event}' is not accepted while {step}")]
    InvalidTransition {
        /// Step the machine was in
        step: SubmissionStep,
        /// Name of the rejected event
        event: &'static str,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
