//! # modelrep engine
//!
//! **Drivers for rating submission and reputation aggregation**
//!
//! Connects the pure logic in `modelrep-core` to the ledger and review store:
//!
//! - [`SubmissionOrchestrator`]: runs the submission state machine against a
//!   `ChainClient` and an `OffchainStore`, one attempt at a time
//! - [`ReputationAggregator`]: loads ledger aggregates in bounded concurrent
//!   batches and publishes the ranked view after each batch
//! - [`ReviewFeed`]: on-demand reviews for one model, checked against the ledger
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use modelrep_chain::MemoryLedger;
//! use modelrep_core::{Model, RatingRequest, SubmissionStep};
//! use modelrep_engine::{AggregatorConfig, OrchestratorConfig, ReputationAggregator, SubmissionOrchestrator};
//! use modelrep_offchain::MemoryOffchainStore;
//!
//! # tokio_test::block_on(async {
//! let me = "0x1234567890123456789012345678901234567890".parse().unwrap();
//! let ledger = Arc::new(MemoryLedger::new(31337).with_account(me));
//! let store = Arc::new(MemoryOffchainStore::new());
//!
//! let aggregator = Arc::new(ReputationAggregator::new(ledger.clone(), AggregatorConfig::default()));
//! aggregator.load(vec![Model::new(1, "a/one", "One")], Some(me)).await;
//!
//! let orchestrator = SubmissionOrchestrator::new(
//!     ledger,
//!     store,
//!     aggregator.clone(),
//!     OrchestratorConfig::new(31337),
//! );
//! let state = orchestrator.submit(RatingRequest::new(1, 5, None, None).unwrap()).await.unwrap();
//! assert_eq!(state.step, SubmissionStep::Success);
//! # });
//! ```

pub mod aggregator;
pub mod error;
pub mod orchestrator;
pub mod reviews;

// Re-export main types for convenience
pub use aggregator::{AggregatorConfig, ReputationAggregator, DEFAULT_BATCH_SIZE};
pub use error::{EngineError, Result};
pub use orchestrator::{OrchestratorConfig, SubmissionOrchestrator};
pub use reviews::{ModelReviews, ReconciledReview, ReviewFeed, ReviewStatus};
