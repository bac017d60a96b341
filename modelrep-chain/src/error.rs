//! Error types for ledger access.
//!
//! Provider and signer failures arrive as opaque messages; `classify`
//! sorts them into the variants the submission flow needs to tell apart.

use modelrep_core::SubmissionErrorKind;
use thiserror::Error;

/// Errors that can occur while reading from or writing to the ledger.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC transport or network error.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// RPC request kept failing after retries.
    #[error("RPC timeout after {attempts} attempts")]
    RpcTimeout {
        /// Number of attempts made
        attempts: u32,
    },

    /// Contract call could not be encoded or decoded.
    #[error("Contract error: {0}")]
    ContractError(String),

    /// No signer is configured.
    #[error("No wallet connected")]
    WalletNotConnected,

    /// The wallet could not be moved to the required chain.
    #[error("Network switch to chain {chain_id} rejected: {reason}")]
    NetworkSwitchRejected {
        /// Chain the switch targeted
        chain_id: u64,
        /// Why the switch was refused
        reason: String,
    },

    /// The signer refused to sign.
    #[error("Signature rejected: {0}")]
    SignatureRejected(String),

    /// Account cannot pay for gas.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// No receipt within the confirmation window.
    #[error("Transaction {tx_hash} not confirmed within {seconds}s")]
    ConfirmationTimeout {
        /// Hash of the transaction waited on
        tx_hash: String,
        /// Seconds waited
        seconds: u64,
    },

    /// Transaction was mined but reverted.
    #[error("Transaction {0} reverted")]
    Reverted(String),

    /// Transaction disappeared from the mempool.
    #[error("Transaction {0} dropped before confirmation")]
    Dropped(String),

    /// Invalid configuration (URL, contract address, key).
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChainError {
    /// Classifies a provider or signer message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("insufficient funds") {
            return ChainError::InsufficientFunds(message);
        }

        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected by user")
            || lower.contains("request rejected")
        {
            return ChainError::SignatureRejected(message);
        }

        if lower.contains("rate limit") || lower.contains("too many requests") {
            return ChainError::RpcError("Rate limited by RPC provider. Try again later.".to_string());
        }

        ChainError::RpcError(message)
    }

    /// Whether retrying the same read may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ChainError::RpcError(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connection")
                    || msg.contains("rate limit")
                    || msg.contains("temporarily")
            }
            _ => false,
        }
    }

    /// Maps the error onto the caller-facing submission taxonomy.
    pub fn submission_kind(&self) -> SubmissionErrorKind {
        match self {
            ChainError::WalletNotConnected => SubmissionErrorKind::WalletNotConnected,
            ChainError::NetworkSwitchRejected { .. } => SubmissionErrorKind::NetworkSwitchRejected,
            ChainError::SignatureRejected(_) => SubmissionErrorKind::SignatureRejected,
            ChainError::InsufficientFunds(_) => SubmissionErrorKind::InsufficientFunds,
            ChainError::ConfirmationTimeout { .. } | ChainError::Reverted(_) | ChainError::Dropped(_) => {
                SubmissionErrorKind::ChainConfirmationFailed
            }
            _ => SubmissionErrorKind::Unknown,
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, ChainError>;
