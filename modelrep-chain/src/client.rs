//! Capability traits over the rating contract and the wallet.
//!
//! The submission flow and the aggregator only see these traits, so they
//! run unchanged against a JSON-RPC node or an in-process ledger.

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use modelrep_core::{ReputationSnapshot, Score};

use crate::error::Result;

/// What the node knows about a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Mined with a successful receipt.
    Confirmed,
    /// Mined and reverted.
    Reverted,
    /// Known to the node, not mined yet.
    Pending,
    /// Never seen, or dropped from the mempool.
    Unknown,
}

/// Read-only view of the rating contract.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// `getReputation(modelId)`.
    async fn reputation(&self, model_id: u64) -> Result<ReputationSnapshot>;

    /// `getUserRating(modelId, rater)`; `None` when the rater has no slot.
    async fn user_rating(&self, model_id: u64, rater: Address) -> Result<Option<Score>>;

    /// `getTotalRatings()`.
    async fn total_ratings(&self) -> Result<u64>;
}

/// Wallet-side operations needed to submit a rating.
#[async_trait]
pub trait ChainClient: LedgerReader {
    /// Connected account, if any.
    fn account(&self) -> Option<Address>;

    /// Chain the wallet is currently on.
    async fn chain_id(&self) -> Result<u64>;

    /// Moves the wallet to `chain_id`.
    async fn switch_chain(&self, chain_id: u64) -> Result<()>;

    /// Signs and broadcasts `rateModel(modelId, score)`; returns the tx hash.
    async fn submit_rating(&self, model_id: u64, score: Score) -> Result<H256>;

    /// Waits up to `timeout` for a successful receipt.
    async fn await_confirmation(&self, tx_hash: H256, timeout: Duration) -> Result<()>;

    /// Current status of `tx_hash`, without waiting.
    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus>;
}
