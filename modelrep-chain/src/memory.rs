//! In-process ledger with the rating contract's semantics.
//!
//! One slot per `(model, rater)`, overwritten on re-rating; aggregates are
//! recomputed from the slots on every read. Transactions are staged on
//! `submit_rating` and applied on confirmation. `LedgerFaults` injects the
//! failures a real wallet and node produce.
//!
//! # Example
//!
//! ```rust
//! use modelrep_chain::{ChainClient, LedgerReader, MemoryLedger};
//! use modelrep_core::Score;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let rater = "0x1234567890123456789012345678901234567890".parse().unwrap();
//! let ledger = MemoryLedger::new(31337).with_account(rater);
//!
//! let tx = ledger.submit_rating(1, Score::new(4).unwrap()).await.unwrap();
//! ledger.await_confirmation(tx, Duration::from_secs(1)).await.unwrap();
//!
//! let snapshot = ledger.reputation(1).await.unwrap();
//! assert_eq!(snapshot.total_ratings, 1);
//! assert_eq!(snapshot.average_score, 4.0);
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::{Address, H256};
use ethers::utils::keccak256;
use modelrep_core::{ReputationSnapshot, Score};

use crate::client::{ChainClient, LedgerReader, TxStatus};
use crate::error::{ChainError, Result};

/// Failures to inject into the next operations.
#[derive(Debug, Clone, Default)]
pub struct LedgerFaults {
    /// Reads of these model ids fail with a connection error.
    pub unreachable_models: HashSet<u64>,
    /// `getTotalRatings` fails.
    pub total_unavailable: bool,
    pub reject_switch: bool,
    pub reject_signature: bool,
    pub insufficient_funds: bool,
    /// Confirmation times out and the transaction stays pending.
    pub stall_confirmation: bool,
    /// Confirmation times out but the transaction is mined anyway.
    pub confirm_after_timeout: bool,
    /// Transaction is mined and reverts.
    pub revert: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    slots: HashMap<(u64, Address), Score>,
    pending: HashMap<H256, (u64, Address, Score)>,
    /// Mined transactions and whether they succeeded.
    mined: HashMap<H256, bool>,
    wallet_chain: u64,
    nonce: u64,
    submissions: usize,
    faults: LedgerFaults,
}

/// In-memory rating ledger implementing both capability traits.
#[derive(Debug)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    account: Option<Address>,
    chain_id: u64,
}

impl MemoryLedger {
    /// Ledger on `chain_id` with the wallet already on that chain and no account.
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                wallet_chain: chain_id,
                ..LedgerState::default()
            }),
            account: None,
            chain_id,
        }
    }

    pub fn with_account(mut self, account: Address) -> Self {
        self.account = Some(account);
        self
    }

    /// Start the wallet on a different chain.
    pub fn with_wallet_chain(self, chain_id: u64) -> Self {
        self.lock().wallet_chain = chain_id;
        self
    }

    /// Write a confirmed rating directly, bypassing the wallet.
    pub fn seed_rating(&self, model_id: u64, rater: Address, score: Score) {
        self.lock().slots.insert((model_id, rater), score);
    }

    pub fn set_faults(&self, faults: LedgerFaults) {
        self.lock().faults = faults;
    }

    pub fn clear_faults(&self) {
        self.lock().faults = LedgerFaults::default();
    }

    /// Number of transactions broadcast so far.
    pub fn submissions(&self) -> usize {
        self.lock().submissions
    }

    pub fn wallet_chain(&self) -> u64 {
        self.lock().wallet_chain
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(state: &LedgerState, model_id: u64) -> Result<()> {
        if state.faults.unreachable_models.contains(&model_id) {
            return Err(ChainError::RpcError(format!(
                "connection refused while reading model {}",
                model_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn reputation(&self, model_id: u64) -> Result<ReputationSnapshot> {
        let state = self.lock();
        Self::check_reachable(&state, model_id)?;

        let scores: Vec<u64> = state
            .slots
            .iter()
            .filter(|((id, _), _)| *id == model_id)
            .map(|(_, score)| score.get() as u64)
            .collect();

        let total = scores.len() as u64;
        let average = if total == 0 {
            0.0
        } else {
            scores.iter().sum::<u64>() as f64 / total as f64
        };
        Ok(ReputationSnapshot::new(model_id, average, total))
    }

    async fn user_rating(&self, model_id: u64, rater: Address) -> Result<Option<Score>> {
        let state = self.lock();
        Self::check_reachable(&state, model_id)?;
        Ok(state.slots.get(&(model_id, rater)).copied())
    }

    async fn total_ratings(&self) -> Result<u64> {
        let state = self.lock();
        if state.faults.total_unavailable {
            return Err(ChainError::RpcError("connection reset".to_string()));
        }
        Ok(state.slots.len() as u64)
    }
}

#[async_trait]
impl ChainClient for MemoryLedger {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn chain_id(&self) -> Result<u64> {
        if self.account.is_none() {
            return Err(ChainError::WalletNotConnected);
        }
        Ok(self.lock().wallet_chain)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        let mut state = self.lock();
        if state.faults.reject_switch {
            return Err(ChainError::NetworkSwitchRejected {
                chain_id,
                reason: "user rejected the request".to_string(),
            });
        }
        if chain_id != self.chain_id {
            return Err(ChainError::NetworkSwitchRejected {
                chain_id,
                reason: format!("unknown chain {}", chain_id),
            });
        }
        state.wallet_chain = chain_id;
        Ok(())
    }

    async fn submit_rating(&self, model_id: u64, score: Score) -> Result<H256> {
        let rater = self.account.ok_or(ChainError::WalletNotConnected)?;
        let mut state = self.lock();

        if state.faults.reject_signature {
            return Err(ChainError::SignatureRejected("user rejected transaction".to_string()));
        }
        if state.faults.insufficient_funds {
            return Err(ChainError::InsufficientFunds(
                "insufficient funds for gas * price + value".to_string(),
            ));
        }
        if state.wallet_chain != self.chain_id {
            return Err(ChainError::RpcError(format!(
                "wallet on chain {} but contract lives on {}",
                state.wallet_chain, self.chain_id
            )));
        }

        state.nonce += 1;
        state.submissions += 1;
        let mut preimage = rater.as_bytes().to_vec();
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        let tx_hash = H256::from(keccak256(preimage));

        state.pending.insert(tx_hash, (model_id, rater, score));
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: H256, timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        let timed_out = || ChainError::ConfirmationTimeout {
            tx_hash: format!("{:?}", tx_hash),
            seconds: timeout.as_secs(),
        };

        if state.faults.stall_confirmation {
            return Err(timed_out());
        }

        let (model_id, rater, score) = state
            .pending
            .remove(&tx_hash)
            .ok_or_else(|| ChainError::Dropped(format!("{:?}", tx_hash)))?;

        if state.faults.revert {
            state.mined.insert(tx_hash, false);
            return Err(ChainError::Reverted(format!("{:?}", tx_hash)));
        }

        state.slots.insert((model_id, rater), score);
        state.mined.insert(tx_hash, true);

        if state.faults.confirm_after_timeout {
            return Err(timed_out());
        }
        Ok(())
    }

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus> {
        let state = self.lock();
        Ok(match state.mined.get(&tx_hash) {
            Some(true) => TxStatus::Confirmed,
            Some(false) => TxStatus::Reverted,
            None if state.pending.contains_key(&tx_hash) => TxStatus::Pending,
            None => TxStatus::Unknown,
        })
    }
}
