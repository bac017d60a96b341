//! Drives the submission state machine against the ledger and review store.
//!
//! Each call feeds one caller event into `transition` and then runs the
//! returned effects, turning their outcomes back into events until the
//! machine stops producing work. Only one attempt runs at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use ethers_core::types::H256;
use modelrep_chain::{ChainClient, NetworkConfig, TxStatus};
use modelrep_core::{
    transition, CoreError, Effect, OffchainWarning, RatingRequest, SubmissionEvent, SubmissionState,
    SubmissionStep,
};
use modelrep_offchain::{OffchainStore, ReviewSubmission};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregator::ReputationAggregator;
use crate::error::{EngineError, Result};

/// Default wait for a transaction receipt.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default pause before re-reading the ledger after a confirmed rating.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Orchestrator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Chain the rating contract lives on.
    pub required_chain_id: u64,
    pub confirmation_timeout: Duration,
    pub settle_delay: Duration,
}

impl OrchestratorConfig {
    pub fn new(required_chain_id: u64) -> Self {
        Self {
            required_chain_id,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn for_network(network: &NetworkConfig) -> Self {
        Self::new(network.chain_id)
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Runs rating submissions for one wallet session.
pub struct SubmissionOrchestrator {
    chain: Arc<dyn ChainClient>,
    offchain: Arc<dyn OffchainStore>,
    aggregator: Arc<ReputationAggregator>,
    config: OrchestratorConfig,
    state_tx: watch::Sender<SubmissionState>,
    active: Mutex<()>,
    refreshes: StdMutex<Vec<JoinHandle<()>>>,
}

impl SubmissionOrchestrator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        offchain: Arc<dyn OffchainStore>,
        aggregator: Arc<ReputationAggregator>,
        config: OrchestratorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SubmissionState::default());
        Self {
            chain,
            offchain,
            aggregator,
            config,
            state_tx,
            active: Mutex::new(()),
            refreshes: StdMutex::new(Vec::new()),
        }
    }

    /// Submits a rating and runs the attempt to its end.
    ///
    /// Without a connected account the state stays `Idle` carrying a
    /// `wallet-not-connected` error.
    ///
    /// # Errors
    ///
    /// `SubmissionInFlight` while another attempt runs, or a validation
    /// error for the request. Ledger and store failures are reported in the
    /// returned state, not as `Err`.
    pub async fn submit(&self, request: RatingRequest) -> Result<SubmissionState> {
        let _guard = self.active.try_lock().map_err(|_| EngineError::SubmissionInFlight)?;

        let event = if self.chain.account().is_some() {
            SubmissionEvent::Submit(request)
        } else {
            SubmissionEvent::WalletMissing
        };
        self.drive(event).await
    }

    /// Starts a new attempt for the request that ended in `Error`.
    pub async fn retry(&self) -> Result<SubmissionState> {
        let _guard = self.active.try_lock().map_err(|_| EngineError::SubmissionInFlight)?;
        self.drive(SubmissionEvent::Retry).await
    }

    /// Re-sends the review for a confirmed rating whose review was not stored.
    ///
    /// Only valid in `Success` with an `offchain-persistence-failed` warning;
    /// the ledger is not touched. A repeated failure replaces the warning.
    pub async fn retry_review(&self) -> Result<SubmissionState> {
        let _guard = self.active.try_lock().map_err(|_| EngineError::SubmissionInFlight)?;

        let current = self.state();
        let (request, tx_hash) = match (&current.request, &current.warning) {
            (Some(request), Some(warning)) if current.step == SubmissionStep::Success => {
                (request.clone(), warning.tx_hash)
            }
            _ => {
                return Err(CoreError::InvalidTransition {
                    step: current.step,
                    event: "retry-review",
                }
                .into())
            }
        };

        let mut next = current;
        match self.persist_review(&request, tx_hash).await {
            SubmissionEvent::OffchainSaved => {
                info!(model_id = request.model_id, tx_hash = ?tx_hash, "review stored on retry");
                next.warning = None;
            }
            SubmissionEvent::OffchainFailed(message) | SubmissionEvent::Fault(message) => {
                next.warning = Some(OffchainWarning { message, tx_hash });
            }
            _ => {}
        }
        self.state_tx.send_replace(next.clone());
        Ok(next)
    }

    /// Dismisses a finished attempt. Not allowed mid-flight.
    pub fn cancel(&self) -> Result<SubmissionState> {
        let _guard = self.active.try_lock().map_err(|_| EngineError::SubmissionInFlight)?;
        let (next, _) = transition(&self.state(), SubmissionEvent::Cancel)?;
        self.state_tx.send_replace(next.clone());
        Ok(next)
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SubmissionState {
        self.state_tx.borrow().clone()
    }

    pub fn aggregator(&self) -> &Arc<ReputationAggregator> {
        &self.aggregator
    }

    /// Waits for every scheduled post-success refresh to finish.
    pub async fn wait_for_refresh(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.refreshes.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "refresh task failed");
            }
        }
    }

    async fn drive(&self, first: SubmissionEvent) -> Result<SubmissionState> {
        let _interrupt = InterruptGuard {
            state_tx: &self.state_tx,
        };
        let mut events = VecDeque::from([first]);

        while let Some(event) = events.pop_front() {
            let current = self.state();
            let (next, effects) = transition(&current, event)?;

            if next.step != current.step {
                info!(step = %next.step, attempt = next.attempt, tx_hash = ?next.tx_hash, "submission step");
            }
            self.state_tx.send_replace(next);

            for effect in effects {
                if let Some(outcome) = self.run_effect(effect).await {
                    events.push_back(outcome);
                }
            }
        }

        Ok(self.state())
    }

    async fn run_effect(&self, effect: Effect) -> Option<SubmissionEvent> {
        match effect {
            Effect::NotifyWalletRequired => {
                warn!("rating requires a connected wallet");
                None
            }
            Effect::EnsureNetwork => Some(self.ensure_network().await),
            Effect::VerifyPriorAttempt { model_id, tx_hash } => Some(self.verify_prior(model_id, tx_hash).await),
            Effect::SignAndBroadcast { model_id, score } => {
                Some(match self.chain.submit_rating(model_id, score).await {
                    Ok(tx_hash) => {
                        info!(model_id, tx_hash = ?tx_hash, "rating broadcast");
                        SubmissionEvent::Broadcast(tx_hash)
                    }
                    Err(e) => SubmissionEvent::SigningFailed {
                        kind: e.submission_kind(),
                        message: e.to_string(),
                    },
                })
            }
            Effect::AwaitConfirmation { tx_hash } => Some(
                match self
                    .chain
                    .await_confirmation(tx_hash, self.config.confirmation_timeout)
                    .await
                {
                    Ok(()) => SubmissionEvent::Confirmed,
                    Err(e) => {
                        warn!(tx_hash = ?tx_hash, error = %e, "rating not confirmed");
                        SubmissionEvent::ConfirmationFailed(e.to_string())
                    }
                },
            ),
            Effect::PersistReview { request, tx_hash } => Some(self.persist_review(&request, tx_hash).await),
            Effect::ApplyOptimistic { model_id, score } => {
                self.aggregator.apply_optimistic(model_id, score);
                None
            }
            Effect::ScheduleRefresh { model_id } => {
                self.schedule_refresh(model_id);
                None
            }
        }
    }

    async fn ensure_network(&self) -> SubmissionEvent {
        let required = self.config.required_chain_id;
        match self.chain.chain_id().await {
            Ok(current) if current == required => SubmissionEvent::NetworkReady,
            Ok(current) => {
                info!(from = current, to = required, "switching network");
                match self.chain.switch_chain(required).await {
                    Ok(()) => SubmissionEvent::NetworkReady,
                    Err(e) => SubmissionEvent::NetworkSwitchRejected(e.to_string()),
                }
            }
            Err(e) => SubmissionEvent::Fault(e.to_string()),
        }
    }

    /// Checks whether a timed-out attempt landed after all.
    ///
    /// Only a successful receipt for that exact tx counts; a matching score
    /// on the ledger may come from an older rating.
    async fn verify_prior(&self, model_id: u64, tx_hash: H256) -> SubmissionEvent {
        match self.chain.transaction_status(tx_hash).await {
            Ok(TxStatus::Confirmed) => {
                info!(model_id, tx_hash = ?tx_hash, "earlier attempt was confirmed");
                SubmissionEvent::PriorAttemptConfirmed
            }
            Ok(status) => {
                info!(model_id, tx_hash = ?tx_hash, ?status, "earlier attempt not confirmed; sending again");
                SubmissionEvent::PriorAttemptMissing
            }
            Err(e) => {
                warn!(model_id, tx_hash = ?tx_hash, error = %e, "could not check earlier attempt");
                SubmissionEvent::PriorAttemptMissing
            }
        }
    }

    async fn persist_review(&self, request: &RatingRequest, tx_hash: H256) -> SubmissionEvent {
        let Some(reviewer) = self.chain.account() else {
            return SubmissionEvent::OffchainFailed("no connected account".to_string());
        };

        let submission = ReviewSubmission::from_request(request, reviewer, tx_hash);
        match self.offchain.save_review(&submission).await {
            Ok(()) => SubmissionEvent::OffchainSaved,
            Err(e) => {
                warn!(model_id = request.model_id, tx_hash = ?tx_hash, error = %e, "review not saved; rating is on the ledger");
                SubmissionEvent::OffchainFailed(e.to_string())
            }
        }
    }

    fn schedule_refresh(&self, model_id: u64) {
        let aggregator = Arc::clone(&self.aggregator);
        let caller = self.chain.account();
        let delay = self.config.settle_delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = aggregator.refresh_model(model_id, caller).await {
                debug!(model_id, error = %e, "model refresh skipped");
            }
            if let Err(e) = aggregator.refresh_total().await {
                warn!(error = %e, "total refresh failed");
            }
        });

        let mut refreshes = self.refreshes.lock().unwrap_or_else(PoisonError::into_inner);
        refreshes.retain(|h| !h.is_finished());
        refreshes.push(handle);
    }
}

/// Settles an attempt whose driving future was dropped mid-flight, so the
/// session can retry or cancel instead of staying in an in-flight step.
struct InterruptGuard<'a> {
    state_tx: &'a watch::Sender<SubmissionState>,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.state_tx.send_if_modified(|state| {
            if !state.step.is_in_flight() {
                return false;
            }
            match transition(state, SubmissionEvent::Interrupted) {
                Ok((next, _)) => {
                    warn!(step = %state.step, tx_hash = ?next.tx_hash, "submission interrupted");
                    *state = next;
                    true
                }
                Err(_) => false,
            }
        });
    }
}
