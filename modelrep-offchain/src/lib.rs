//! # modelrep off-chain
//!
//! **Client for the mutable review store**
//!
//! Comments and tags live in a conventional REST service next to the ledger.
//! This crate wraps that service behind the [`OffchainStore`] trait:
//!
//! - [`HttpOffchainStore`]: `reqwest` client for the deployed API
//! - [`MemoryOffchainStore`]: in-process store with the same upsert rules
//!
//! Nothing read from here is ever treated as rating data; the ledger stays
//! the source of truth for scores and counts.

pub mod error;
pub mod http;
pub mod memory;
pub mod store;

// Re-export main types for convenience
pub use error::{OffchainError, Result};
pub use http::HttpOffchainStore;
pub use memory::MemoryOffchainStore;
pub use store::{CheckResponse, CheckedRating, OffchainStore, ReviewSubmission, ReviewsResponse};
