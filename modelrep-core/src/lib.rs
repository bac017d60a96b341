//! # modelrep core
//!
//! **Data model and pure state logic for on-chain model ratings**
//!
//! This crate holds everything about model reputation that does not touch the
//! network: the rating and review types, the ranking/merge reducer that turns
//! ledger reads into a ranked view, and the submission state machine that
//! sequences a single rating from network check to off-chain persistence.
//!
//! ## Features
//!
//! - **Ledger-first**: aggregates are only ever built from ledger reads
//! - **Pure reducers**: `(view, batch) -> view` and `(state, event) -> (state, effects)`
//! - **No I/O**: drivers live in `modelrep-engine`
//!
//! ## Quick Start
//!
//! ```rust
//! use modelrep_core::{transition, RatingRequest, SubmissionEvent, SubmissionState, SubmissionStep};
//!
//! let request = RatingRequest::new(7, 4, Some("solid".into()), None).unwrap();
//! let (state, effects) = transition(&SubmissionState::default(), SubmissionEvent::Submit(request)).unwrap();
//!
//! assert_eq!(state.step, SubmissionStep::SwitchingNetwork);
//! assert_eq!(effects.len(), 1);
//! ```

pub mod error;
pub mod model;
pub mod ranking;
pub mod review;
pub mod submission;

// Re-export main types for convenience
pub use error::{CoreError, Result};
pub use model::{Model, ModelWithReputation, OnChainRating, ReputationSnapshot, Score, UserRating};
pub use ranking::{
    apply_optimistic, apply_refresh, attach_comment, merge_batch, rank, set_total, BatchResult,
    ModelFetch, RankedView,
};
pub use review::{RatingRequest, Review, ReviewTag, MAX_COMMENT_CHARS};
pub use submission::{
    transition, Effect, OffchainWarning, SubmissionError, SubmissionErrorKind, SubmissionEvent,
    SubmissionState, SubmissionStep,
};
