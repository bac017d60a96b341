//! End-to-end submission scenarios against the in-memory ledger and store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::{Address, H256};
use modelrep_chain::{ChainClient, LedgerFaults, LedgerReader, MemoryLedger, TxStatus};
use modelrep_core::{
    Model, RatingRequest, ReputationSnapshot, ReviewTag, Score, SubmissionErrorKind, SubmissionStep,
};
use modelrep_engine::{
    AggregatorConfig, EngineError, OrchestratorConfig, ReputationAggregator, SubmissionOrchestrator,
};
use modelrep_offchain::MemoryOffchainStore;
use tokio::sync::Notify;

const CHAIN: u64 = 84532;
const MODEL: u64 = 1;

fn me() -> Address {
    "0x1234567890123456789012345678901234567890".parse().unwrap()
}

fn score(v: u8) -> Score {
    Score::new(v).unwrap()
}

fn catalog() -> Vec<Model> {
    vec![
        Model::new(1, "openai/gpt-4o", "GPT-4o"),
        Model::new(2, "anthropic/claude-3-haiku", "Claude 3 Haiku"),
    ]
}

struct Harness {
    ledger: Arc<MemoryLedger>,
    store: Arc<MemoryOffchainStore>,
    orchestrator: SubmissionOrchestrator,
}

impl Harness {
    async fn new(ledger: MemoryLedger) -> Self {
        let ledger = Arc::new(ledger);
        let store = Arc::new(MemoryOffchainStore::with_models(catalog()));
        let aggregator = Arc::new(ReputationAggregator::new(ledger.clone(), AggregatorConfig::default()));
        aggregator.load(catalog(), ledger.account()).await;

        let config = OrchestratorConfig::new(CHAIN)
            .with_settle_delay(Duration::from_millis(20))
            .with_confirmation_timeout(Duration::from_secs(5));
        let orchestrator = SubmissionOrchestrator::new(ledger.clone(), store.clone(), aggregator, config);

        Self {
            ledger,
            store,
            orchestrator,
        }
    }

    fn entry_total(&self) -> u64 {
        self.orchestrator.aggregator().view().get(MODEL).unwrap().total_ratings()
    }
}

#[tokio::test]
async fn test_fresh_rating() {
    let ledger = MemoryLedger::new(CHAIN).with_account(me());
    ledger.seed_rating(MODEL, Address::repeat_byte(1), score(5));
    ledger.seed_rating(MODEL, Address::repeat_byte(2), score(3));
    let h = Harness::new(ledger).await;

    let request = RatingRequest::new(MODEL, 4, Some("good at code".into()), Some(ReviewTag::Coding)).unwrap();
    let state = h.orchestrator.submit(request).await.unwrap();

    assert_eq!(state.step, SubmissionStep::Success);
    assert!(state.error.is_none());
    assert!(state.warning.is_none());
    let tx = state.tx_hash.unwrap();

    let review = h.store.review(MODEL, me()).unwrap();
    assert_eq!(review.tx_hash, tx);
    assert_eq!(review.comment.as_deref(), Some("good at code"));
    assert_eq!(review.tag, Some(ReviewTag::Coding));

    // optimistic score only; aggregates wait for the ledger
    let view = h.orchestrator.aggregator().view();
    let entry = view.get(MODEL).unwrap();
    let mine = entry.user_rating.unwrap();
    assert_eq!(mine.score, score(4));
    assert!(mine.optimistic);
    assert_eq!(entry.total_ratings(), 2);

    h.orchestrator.wait_for_refresh().await;

    let view = h.orchestrator.aggregator().view();
    let entry = view.get(MODEL).unwrap();
    assert_eq!(entry.total_ratings(), 3);
    assert_eq!(entry.average_score(), 4.0);
    assert!(!entry.user_rating.unwrap().optimistic);
    assert_eq!(view.total_ratings, Some(3));
}

#[tokio::test]
async fn test_rerating_replaces() {
    let ledger = MemoryLedger::new(CHAIN).with_account(me());
    ledger.seed_rating(MODEL, Address::repeat_byte(1), score(4));
    ledger.seed_rating(MODEL, me(), score(5));
    let h = Harness::new(ledger).await;
    assert_eq!(h.entry_total(), 2);

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 2, None, None).unwrap())
        .await
        .unwrap();
    assert_eq!(state.step, SubmissionStep::Success);

    h.orchestrator.wait_for_refresh().await;

    let view = h.orchestrator.aggregator().view();
    let entry = view.get(MODEL).unwrap();
    assert_eq!(entry.total_ratings(), 2);
    assert_eq!(entry.average_score(), 3.0);
    assert_eq!(entry.user_rating.unwrap().score, score(2));
}

#[tokio::test]
async fn test_rejected_signature_then_retry() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    h.ledger.set_faults(LedgerFaults {
        reject_signature: true,
        ..LedgerFaults::default()
    });

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 5, Some("x".into()), None).unwrap())
        .await
        .unwrap();

    assert_eq!(state.step, SubmissionStep::Error);
    let error = state.error.unwrap();
    assert_eq!(error.kind, SubmissionErrorKind::SignatureRejected);
    assert!(error.kind.is_retryable());
    assert!(state.tx_hash.is_none());
    assert_eq!(h.store.review_count(), 0);
    assert_eq!(h.ledger.submissions(), 0);

    h.ledger.clear_faults();
    let state = h.orchestrator.retry().await.unwrap();
    assert_eq!(state.step, SubmissionStep::Success);
    assert_eq!(state.attempt, 2);
    assert_eq!(h.store.review_count(), 1);
}

#[tokio::test]
async fn test_offchain_outage_is_not_fatal() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    h.store.set_unavailable(true);

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 3, Some("ok".into()), Some(ReviewTag::Fast)).unwrap())
        .await
        .unwrap();

    assert_eq!(state.step, SubmissionStep::Success);
    assert!(state.error.is_none());
    let warning = state.warning.unwrap();
    assert_eq!(Some(warning.tx_hash), state.tx_hash);
    assert_eq!(h.ledger.user_rating(MODEL, me()).await.unwrap(), Some(score(3)));
    assert_eq!(h.store.review_count(), 0);
}

#[tokio::test]
async fn test_review_resaved_after_outage() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    assert!(h.orchestrator.retry_review().await.is_err());

    h.store.set_unavailable(true);
    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 5, Some("worth it".into()), None).unwrap())
        .await
        .unwrap();
    assert!(state.warning.is_some());

    // still down: warning stays
    let state = h.orchestrator.retry_review().await.unwrap();
    assert!(state.warning.is_some());

    h.store.set_unavailable(false);
    let state = h.orchestrator.retry_review().await.unwrap();
    assert_eq!(state.step, SubmissionStep::Success);
    assert!(state.warning.is_none());

    let review = h.store.review(MODEL, me()).unwrap();
    assert_eq!(Some(review.tx_hash), state.tx_hash);
    assert_eq!(review.comment.as_deref(), Some("worth it"));
    assert_eq!(h.ledger.submissions(), 1);
}

#[tokio::test]
async fn test_wallet_missing() {
    let h = Harness::new(MemoryLedger::new(CHAIN)).await;

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 3, None, None).unwrap())
        .await
        .unwrap();

    assert_eq!(state.step, SubmissionStep::Idle);
    assert_eq!(state.error.unwrap().kind, SubmissionErrorKind::WalletNotConnected);
    assert_eq!(h.ledger.submissions(), 0);
}

#[tokio::test]
async fn test_network_switch() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me()).with_wallet_chain(1)).await;

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 5, None, None).unwrap())
        .await
        .unwrap();

    assert_eq!(state.step, SubmissionStep::Success);
    assert_eq!(h.ledger.wallet_chain(), CHAIN);
}

#[tokio::test]
async fn test_network_switch_rejected() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me()).with_wallet_chain(1)).await;
    h.ledger.set_faults(LedgerFaults {
        reject_switch: true,
        ..LedgerFaults::default()
    });

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 5, None, None).unwrap())
        .await
        .unwrap();

    assert_eq!(state.step, SubmissionStep::Error);
    assert_eq!(state.error.unwrap().kind, SubmissionErrorKind::NetworkSwitchRejected);
    assert_eq!(h.ledger.submissions(), 0);
}

#[tokio::test]
async fn test_insufficient_funds() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    h.ledger.set_faults(LedgerFaults {
        insufficient_funds: true,
        ..LedgerFaults::default()
    });

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 5, None, None).unwrap())
        .await
        .unwrap();

    let error = state.error.unwrap();
    assert_eq!(error.kind, SubmissionErrorKind::InsufficientFunds);
    assert!(!error.kind.is_retryable());
}

#[tokio::test]
async fn test_retry_after_late_confirmation_reuses_tx() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    h.ledger.set_faults(LedgerFaults {
        confirm_after_timeout: true,
        ..LedgerFaults::default()
    });

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 4, Some("late".into()), None).unwrap())
        .await
        .unwrap();
    assert_eq!(state.step, SubmissionStep::Error);
    assert_eq!(state.error.unwrap().kind, SubmissionErrorKind::ChainConfirmationFailed);
    let first_tx = state.tx_hash.unwrap();

    h.ledger.clear_faults();
    let state = h.orchestrator.retry().await.unwrap();

    assert_eq!(state.step, SubmissionStep::Success);
    assert_eq!(state.tx_hash, Some(first_tx));
    assert_eq!(h.ledger.submissions(), 1);
    assert_eq!(h.store.review(MODEL, me()).unwrap().tx_hash, first_tx);
}

#[tokio::test]
async fn test_retry_after_stalled_confirmation_rebroadcasts() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    h.ledger.set_faults(LedgerFaults {
        stall_confirmation: true,
        ..LedgerFaults::default()
    });

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 4, None, None).unwrap())
        .await
        .unwrap();
    let first_tx = state.tx_hash.unwrap();

    h.ledger.clear_faults();
    let state = h.orchestrator.retry().await.unwrap();

    assert_eq!(state.step, SubmissionStep::Success);
    assert_ne!(state.tx_hash, Some(first_tx));
    assert_eq!(h.ledger.submissions(), 2);
}

#[tokio::test]
async fn test_matching_score_does_not_confirm_stalled_tx() {
    let ledger = MemoryLedger::new(CHAIN).with_account(me());
    ledger.seed_rating(MODEL, me(), score(4));
    let h = Harness::new(ledger).await;
    h.ledger.set_faults(LedgerFaults {
        stall_confirmation: true,
        ..LedgerFaults::default()
    });

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 4, Some("same again".into()), None).unwrap())
        .await
        .unwrap();
    assert_eq!(state.error.unwrap().kind, SubmissionErrorKind::ChainConfirmationFailed);
    let stalled = state.tx_hash.unwrap();

    // ledger already says 4, but the stalled tx itself never landed
    h.ledger.clear_faults();
    let state = h.orchestrator.retry().await.unwrap();

    assert_eq!(state.step, SubmissionStep::Success);
    let tx = state.tx_hash.unwrap();
    assert_ne!(tx, stalled);
    assert_eq!(h.ledger.submissions(), 2);
    assert_eq!(h.ledger.transaction_status(tx).await.unwrap(), TxStatus::Confirmed);
    assert_eq!(h.store.review(MODEL, me()).unwrap().tx_hash, tx);
}

#[tokio::test]
async fn test_reverted_transaction() {
    let ledger = MemoryLedger::new(CHAIN).with_account(me());
    ledger.seed_rating(MODEL, Address::repeat_byte(1), score(2));
    let h = Harness::new(ledger).await;
    h.ledger.set_faults(LedgerFaults {
        revert: true,
        ..LedgerFaults::default()
    });

    let state = h
        .orchestrator
        .submit(RatingRequest::new(MODEL, 5, Some("reverted".into()), None).unwrap())
        .await
        .unwrap();

    assert_eq!(state.step, SubmissionStep::Error);
    assert_eq!(state.error.unwrap().kind, SubmissionErrorKind::ChainConfirmationFailed);
    let reverted = state.tx_hash.unwrap();
    assert_eq!(h.ledger.transaction_status(reverted).await.unwrap(), TxStatus::Reverted);
    assert_eq!(h.store.review_count(), 0);
    assert_eq!(h.ledger.reputation(MODEL).await.unwrap().total_ratings, 1);
    assert!(h.orchestrator.aggregator().view().get(MODEL).unwrap().user_rating.is_none());

    h.ledger.clear_faults();
    let state = h.orchestrator.retry().await.unwrap();
    assert_eq!(state.step, SubmissionStep::Success);
    assert_ne!(state.tx_hash, Some(reverted));
    assert_eq!(h.ledger.submissions(), 2);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_any_work() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    let mut request = RatingRequest::new(MODEL, 4, None, None).unwrap();
    request.comment = Some("x".repeat(501));

    assert!(matches!(h.orchestrator.submit(request).await, Err(EngineError::Core(_))));
    assert_eq!(h.orchestrator.state().step, SubmissionStep::Idle);
    assert_eq!(h.ledger.submissions(), 0);
}

#[tokio::test]
async fn test_cancel_dismisses_finished_attempt() {
    let h = Harness::new(MemoryLedger::new(CHAIN).with_account(me())).await;
    h.ledger.set_faults(LedgerFaults {
        reject_signature: true,
        ..LedgerFaults::default()
    });
    h.orchestrator
        .submit(RatingRequest::new(MODEL, 4, None, None).unwrap())
        .await
        .unwrap();

    let state = h.orchestrator.cancel().unwrap();
    assert_eq!(state.step, SubmissionStep::Idle);
    assert!(state.error.is_none());
    assert!(matches!(h.orchestrator.retry().await, Err(EngineError::Core(_))));
}

/// Ledger whose confirmations wait for an explicit release.
struct GatedLedger {
    inner: MemoryLedger,
    release: Notify,
}

#[async_trait]
impl LedgerReader for GatedLedger {
    async fn reputation(&self, model_id: u64) -> modelrep_chain::Result<ReputationSnapshot> {
        self.inner.reputation(model_id).await
    }

    async fn user_rating(&self, model_id: u64, rater: Address) -> modelrep_chain::Result<Option<Score>> {
        self.inner.user_rating(model_id, rater).await
    }

    async fn total_ratings(&self) -> modelrep_chain::Result<u64> {
        self.inner.total_ratings().await
    }
}

#[async_trait]
impl ChainClient for GatedLedger {
    fn account(&self) -> Option<Address> {
        self.inner.account()
    }

    async fn chain_id(&self) -> modelrep_chain::Result<u64> {
        self.inner.chain_id().await
    }

    async fn switch_chain(&self, chain_id: u64) -> modelrep_chain::Result<()> {
        self.inner.switch_chain(chain_id).await
    }

    async fn submit_rating(&self, model_id: u64, score: Score) -> modelrep_chain::Result<H256> {
        self.inner.submit_rating(model_id, score).await
    }

    async fn await_confirmation(&self, tx_hash: H256, timeout: Duration) -> modelrep_chain::Result<()> {
        self.release.notified().await;
        self.inner.await_confirmation(tx_hash, timeout).await
    }

    async fn transaction_status(&self, tx_hash: H256) -> modelrep_chain::Result<TxStatus> {
        self.inner.transaction_status(tx_hash).await
    }
}

fn gated_orchestrator() -> (Arc<GatedLedger>, Arc<SubmissionOrchestrator>) {
    let ledger = Arc::new(GatedLedger {
        inner: MemoryLedger::new(CHAIN).with_account(me()),
        release: Notify::new(),
    });
    let aggregator = Arc::new(ReputationAggregator::new(ledger.clone(), AggregatorConfig::default()));
    let orchestrator = Arc::new(SubmissionOrchestrator::new(
        ledger.clone(),
        Arc::new(MemoryOffchainStore::new()),
        aggregator,
        OrchestratorConfig::new(CHAIN).with_settle_delay(Duration::ZERO),
    ));
    (ledger, orchestrator)
}

#[tokio::test]
async fn test_second_submission_rejected_while_in_flight() {
    let (ledger, orchestrator) = gated_orchestrator();

    let mut progress = orchestrator.subscribe();
    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .submit(RatingRequest::new(MODEL, 5, None, None).unwrap())
                .await
        })
    };

    progress
        .wait_for(|s| s.step == SubmissionStep::Confirming)
        .await
        .unwrap();

    let second = orchestrator
        .submit(RatingRequest::new(MODEL, 1, None, None).unwrap())
        .await;
    assert!(matches!(second, Err(EngineError::SubmissionInFlight)));
    assert!(matches!(orchestrator.cancel(), Err(EngineError::SubmissionInFlight)));

    ledger.release.notify_one();
    let state = first.await.unwrap().unwrap();
    assert_eq!(state.step, SubmissionStep::Success);
    assert_eq!(ledger.inner.submissions(), 1);
}

#[tokio::test]
async fn test_dropped_submission_can_be_retried() {
    let (ledger, orchestrator) = gated_orchestrator();

    let mut progress = orchestrator.subscribe();
    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .submit(RatingRequest::new(MODEL, 5, None, None).unwrap())
                .await
        })
    };
    progress
        .wait_for(|s| s.step == SubmissionStep::Confirming)
        .await
        .unwrap();
    let broadcast = orchestrator.state().tx_hash.unwrap();

    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    let state = orchestrator.state();
    assert_eq!(state.step, SubmissionStep::Error);
    assert_eq!(state.tx_hash, Some(broadcast));
    assert_eq!(state.error.unwrap().kind, SubmissionErrorKind::ChainConfirmationFailed);

    // the abandoned tx is still pending, so the retry sends a new one
    ledger.release.notify_one();
    let state = orchestrator.retry().await.unwrap();
    assert_eq!(state.step, SubmissionStep::Success);
    assert_ne!(state.tx_hash, Some(broadcast));
    assert_eq!(ledger.inner.submissions(), 2);

    assert_eq!(orchestrator.cancel().unwrap().step, SubmissionStep::Idle);
}
