//! # modelrep chain
//!
//! **Ledger access for the model rating contract**
//!
//! Everything the rest of the workspace needs from the chain is expressed as
//! two capability traits:
//!
//! - [`LedgerReader`]: per-model aggregate, a rater's slot, global total
//! - [`ChainClient`]: the wallet side (account, chain id, network switch,
//!   sign-and-broadcast, confirmation, receipt lookup)
//!
//! Two implementations ship with the crate: [`EthersChainClient`] talks to a
//! JSON-RPC endpoint with a local signer, and [`MemoryLedger`] keeps the
//! contract's state in process for tests and dry runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modelrep_chain::{get_network, EthersChainClient, LedgerReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let network = get_network("local").unwrap().to_config();
//!     let client = EthersChainClient::new(&network)?;
//!
//!     let snapshot = client.reputation(1).await?;
//!     println!("{} ratings, avg {:.2}", snapshot.total_ratings, snapshot.average_score);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod network;
pub mod rpc;

// Re-export main types for convenience
pub use client::{ChainClient, LedgerReader, TxStatus};
pub use error::{ChainError, Result};
pub use memory::{LedgerFaults, MemoryLedger};
pub use network::{get_network, KnownNetwork, NetworkConfig, NETWORKS};
pub use rpc::EthersChainClient;
