//! Rating submission state machine.
//!
//! One submission moves through
//! `Idle → SwitchingNetwork → Signing → Confirming → SavingOffchain → Success`,
//! with `Error` reachable from every in-flight step. The machine is a pure
//! function: `transition(&state, event)` returns the next state and the
//! effects the driver must run. Effect outcomes come back as events.
//!
//! Ledger failures halt the attempt in `Error`. Off-chain failures never do:
//! once the ledger confirmed the rating, the attempt ends in `Success` and
//! the persistence failure travels as an `OffchainWarning`.
//!
//! # Example
//!
//! ```rust
//! use ethers_core::types::H256;
//! use modelrep_core::{transition, RatingRequest, SubmissionEvent, SubmissionState, SubmissionStep};
//!
//! let req = RatingRequest::new(1, 5, None, None).unwrap();
//! let mut state = SubmissionState::default();
//! for event in [
//!     SubmissionEvent::Submit(req),
//!     SubmissionEvent::NetworkReady,
//!     SubmissionEvent::Broadcast(H256::repeat_byte(7)),
//!     SubmissionEvent::Confirmed,
//!     SubmissionEvent::OffchainFailed("503".into()),
//! ] {
//!     state = transition(&state, event).unwrap().0;
//! }
//!
//! assert_eq!(state.step, SubmissionStep::Success);
//! assert!(state.warning.is_some());
//! assert_eq!(state.tx_hash, Some(H256::repeat_byte(7)));
//! ```

use std::fmt;

use ethers_core::types::H256;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::model::Score;
use crate::review::RatingRequest;

/// Where a submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionStep {
    #[default]
    Idle,
    SwitchingNetwork,
    Signing,
    Confirming,
    SavingOffchain,
    Success,
    Error,
}

impl SubmissionStep {
    /// Steps during which the attempt owns the wallet and cannot be cancelled.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            SubmissionStep::SwitchingNetwork
                | SubmissionStep::Signing
                | SubmissionStep::Confirming
                | SubmissionStep::SavingOffchain
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStep::Success | SubmissionStep::Error)
    }
}

impl fmt::Display for SubmissionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStep::Idle => "idle",
            SubmissionStep::SwitchingNetwork => "switching network",
            SubmissionStep::Signing => "signing",
            SubmissionStep::Confirming => "confirming",
            SubmissionStep::SavingOffchain => "saving off-chain",
            SubmissionStep::Success => "success",
            SubmissionStep::Error => "error",
        };
        f.write_str(s)
    }
}

/// Fatal error kinds surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionErrorKind {
    WalletNotConnected,
    NetworkSwitchRejected,
    SignatureRejected,
    InsufficientFunds,
    ChainConfirmationFailed,
    Unknown,
}

impl SubmissionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionErrorKind::WalletNotConnected => "wallet-not-connected",
            SubmissionErrorKind::NetworkSwitchRejected => "network-switch-rejected",
            SubmissionErrorKind::SignatureRejected => "signature-rejected",
            SubmissionErrorKind::InsufficientFunds => "insufficient-funds",
            SubmissionErrorKind::ChainConfirmationFailed => "chain-confirmation-failed",
            SubmissionErrorKind::Unknown => "unknown",
        }
    }

    /// Whether retrying without outside action can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SubmissionErrorKind::WalletNotConnected | SubmissionErrorKind::InsufficientFunds
        )
    }

    /// Message shown when the underlying error carries no detail.
    pub fn default_message(&self) -> &'static str {
        match self {
            SubmissionErrorKind::WalletNotConnected => "Connect a wallet to rate models",
            SubmissionErrorKind::NetworkSwitchRejected => "Network switch was rejected",
            SubmissionErrorKind::SignatureRejected => "Transaction signature was rejected",
            SubmissionErrorKind::InsufficientFunds => "Insufficient funds to pay for gas",
            SubmissionErrorKind::ChainConfirmationFailed => {
                "Transaction was not confirmed; check its status before retrying"
            }
            SubmissionErrorKind::Unknown => "Rating submission failed",
        }
    }
}

impl fmt::Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal error with its human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    pub message: String,
}

impl SubmissionError {
    pub fn new(kind: SubmissionErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.default_message().to_string()
        } else {
            message
        };
        Self { kind, message }
    }
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Non-fatal `offchain-persistence-failed` report. The rating itself is on
/// the ledger; only the comment/tag record is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffchainWarning {
    pub message: String,
    pub tx_hash: H256,
}

impl OffchainWarning {
    pub const KIND: &'static str = "offchain-persistence-failed";
}

/// Externally observable submission state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionState {
    pub step: SubmissionStep,
    #[serde(skip)]
    pub request: Option<RatingRequest>,
    pub tx_hash: Option<H256>,
    pub error: Option<SubmissionError>,
    pub warning: Option<OffchainWarning>,
    /// Attempts made for the current request, starting at 1.
    pub attempt: u32,
}

/// Inputs to the machine: caller actions and effect outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    Submit(RatingRequest),
    WalletMissing,
    NetworkReady,
    NetworkSwitchRejected(String),
    /// The timed-out attempt's receipt shows it succeeded.
    PriorAttemptConfirmed,
    /// The timed-out attempt is pending, reverted or unknown to the node.
    PriorAttemptMissing,
    Broadcast(H256),
    SigningFailed {
        kind: SubmissionErrorKind,
        message: String,
    },
    Confirmed,
    ConfirmationFailed(String),
    OffchainSaved,
    OffchainFailed(String),
    /// Unclassified failure while running an effect.
    Fault(String),
    /// The driver stopped before the attempt finished.
    Interrupted,
    Retry,
    Cancel,
}

impl SubmissionEvent {
    fn name(&self) -> &'static str {
        match self {
            SubmissionEvent::Submit(_) => "submit",
            SubmissionEvent::WalletMissing => "wallet-missing",
            SubmissionEvent::NetworkReady => "network-ready",
            SubmissionEvent::NetworkSwitchRejected(_) => "network-switch-rejected",
            SubmissionEvent::PriorAttemptConfirmed => "prior-attempt-confirmed",
            SubmissionEvent::PriorAttemptMissing => "prior-attempt-missing",
            SubmissionEvent::Broadcast(_) => "broadcast",
            SubmissionEvent::SigningFailed { .. } => "signing-failed",
            SubmissionEvent::Confirmed => "confirmed",
            SubmissionEvent::ConfirmationFailed(_) => "confirmation-failed",
            SubmissionEvent::OffchainSaved => "offchain-saved",
            SubmissionEvent::OffchainFailed(_) => "offchain-failed",
            SubmissionEvent::Fault(_) => "fault",
            SubmissionEvent::Interrupted => "interrupted",
            SubmissionEvent::Retry => "retry",
            SubmissionEvent::Cancel => "cancel",
        }
    }
}

/// Work the driver performs on behalf of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    NotifyWalletRequired,
    /// Compare the wallet chain with the required one; switch if needed.
    EnsureNetwork,
    /// Look up the receipt of a timed-out attempt before re-sending it.
    VerifyPriorAttempt {
        model_id: u64,
        tx_hash: H256,
    },
    SignAndBroadcast {
        model_id: u64,
        score: Score,
    },
    AwaitConfirmation {
        tx_hash: H256,
    },
    PersistReview {
        request: RatingRequest,
        tx_hash: H256,
    },
    ApplyOptimistic {
        model_id: u64,
        score: Score,
    },
    /// Re-read the model and the global total after the settle delay.
    ScheduleRefresh {
        model_id: u64,
    },
}

/// Computes the next state and the effects to run.
///
/// # Errors
///
/// `InvalidTransition` when the event is not accepted in the current step,
/// or a validation error from a `Submit` request. The input state is never
/// modified.
pub fn transition(
    state: &SubmissionState,
    event: SubmissionEvent,
) -> Result<(SubmissionState, Vec<Effect>)> {
    use SubmissionEvent as Ev;
    use SubmissionStep as St;

    let invalid = |event: &SubmissionEvent| CoreError::InvalidTransition {
        step: state.step,
        event: event.name(),
    };

    let mut next = state.clone();

    let effects = match (state.step, event) {
        (St::Idle | St::Success | St::Error, Ev::Submit(request)) => {
            request.validate()?;
            next = SubmissionState {
                step: St::SwitchingNetwork,
                request: Some(request),
                attempt: 1,
                ..SubmissionState::default()
            };
            vec![Effect::EnsureNetwork]
        }
        (St::Idle | St::Success | St::Error, Ev::WalletMissing) => {
            // the last tx hash may be the only handle on an unconfirmed rating
            next = SubmissionState {
                tx_hash: state.tx_hash,
                error: Some(SubmissionError::new(SubmissionErrorKind::WalletNotConnected, "")),
                ..SubmissionState::default()
            };
            vec![Effect::NotifyWalletRequired]
        }

        (St::SwitchingNetwork, Ev::PriorAttemptConfirmed) => {
            let (request, tx_hash) = match (&state.request, state.tx_hash) {
                (Some(r), Some(tx)) => (r.clone(), tx),
                _ => return Err(invalid(&Ev::PriorAttemptConfirmed)),
            };
            next.step = St::SavingOffchain;
            vec![Effect::PersistReview { request, tx_hash }]
        }
        (St::SwitchingNetwork, Ev::PriorAttemptMissing) => {
            next.tx_hash = None;
            vec![Effect::EnsureNetwork]
        }
        (St::SwitchingNetwork, Ev::NetworkReady) => {
            let request = state
                .request
                .as_ref()
                .ok_or_else(|| invalid(&Ev::NetworkReady))?;
            next.step = St::Signing;
            vec![Effect::SignAndBroadcast {
                model_id: request.model_id,
                score: request.score,
            }]
        }
        (St::SwitchingNetwork, Ev::NetworkSwitchRejected(message)) => {
            fail(&mut next, SubmissionErrorKind::NetworkSwitchRejected, message);
            vec![]
        }

        (St::Signing, Ev::Broadcast(tx_hash)) => {
            next.step = St::Confirming;
            next.tx_hash = Some(tx_hash);
            vec![Effect::AwaitConfirmation { tx_hash }]
        }
        (St::Signing, Ev::SigningFailed { kind, message }) => {
            fail(&mut next, kind, message);
            vec![]
        }

        (St::Confirming, Ev::Confirmed) => {
            let (request, tx_hash) = match (&state.request, state.tx_hash) {
                (Some(r), Some(tx)) => (r.clone(), tx),
                _ => return Err(invalid(&Ev::Confirmed)),
            };
            next.step = St::SavingOffchain;
            vec![Effect::PersistReview { request, tx_hash }]
        }
        (St::Confirming, Ev::ConfirmationFailed(message)) => {
            // tx hash stays visible so the caller can look it up
            fail(&mut next, SubmissionErrorKind::ChainConfirmationFailed, message);
            vec![]
        }

        (St::SavingOffchain, Ev::OffchainSaved) => {
            next.step = St::Success;
            success_effects(state)
        }
        (St::SavingOffchain, Ev::OffchainFailed(message) | Ev::Fault(message)) => {
            next.step = St::Success;
            next.warning = state.tx_hash.map(|tx_hash| OffchainWarning { message, tx_hash });
            success_effects(state)
        }

        (St::SwitchingNetwork | St::Signing | St::Confirming, Ev::Fault(message)) => {
            fail(&mut next, SubmissionErrorKind::Unknown, message);
            vec![]
        }

        (St::SwitchingNetwork | St::Signing, Ev::Interrupted) => {
            fail(&mut next, SubmissionErrorKind::Unknown, "Submission was interrupted".to_string());
            vec![]
        }
        (St::Confirming, Ev::Interrupted) => {
            // broadcast already; a retry checks the receipt first
            fail(
                &mut next,
                SubmissionErrorKind::ChainConfirmationFailed,
                "Submission was interrupted before confirmation".to_string(),
            );
            vec![]
        }
        (St::SavingOffchain, Ev::Interrupted) => {
            next.step = St::Success;
            next.warning = state.tx_hash.map(|tx_hash| OffchainWarning {
                message: "Submission was interrupted before the review was saved".to_string(),
                tx_hash,
            });
            vec![]
        }

        (St::Error, Ev::Retry) => {
            let request = state.request.clone().ok_or_else(|| invalid(&Ev::Retry))?;
            let timed_out = state
                .error
                .as_ref()
                .is_some_and(|e| e.kind == SubmissionErrorKind::ChainConfirmationFailed);

            next.step = St::SwitchingNetwork;
            next.error = None;
            next.warning = None;
            next.attempt = state.attempt + 1;

            match (timed_out, state.tx_hash) {
                (true, Some(tx_hash)) => vec![Effect::VerifyPriorAttempt {
                    model_id: request.model_id,
                    tx_hash,
                }],
                _ => {
                    next.tx_hash = None;
                    vec![Effect::EnsureNetwork]
                }
            }
        }

        (St::Idle | St::Success | St::Error, Ev::Cancel) => {
            next = SubmissionState::default();
            vec![]
        }

        (_, event) => return Err(invalid(&event)),
    };

    Ok((next, effects))
}

fn fail(state: &mut SubmissionState, kind: SubmissionErrorKind, message: String) {
    state.step = SubmissionStep::Error;
    state.error = Some(SubmissionError::new(kind, message));
}

fn success_effects(state: &SubmissionState) -> Vec<Effect> {
    match &state.request {
        Some(request) => vec![
            Effect::ApplyOptimistic {
                model_id: request.model_id,
                score: request.score,
            },
            Effect::ScheduleRefresh {
                model_id: request.model_id,
            },
        ],
        None => vec![],
    }
}
