//! Batched reputation loading.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use ethers_core::types::Address;
use modelrep_chain::{LedgerFaults, LedgerReader, MemoryLedger};
use modelrep_core::{Model, RankedView, ReputationSnapshot, Score};
use modelrep_engine::{AggregatorConfig, ReputationAggregator};
use modelrep_offchain::MemoryOffchainStore;
use tokio::sync::watch;

fn catalog(n: u64) -> Vec<Model> {
    (1..=n)
        .map(|i| Model::new(i, format!("vendor/model-{}", i), format!("Model {:02}", i)))
        .collect()
}

fn score(v: u8) -> Score {
    Score::new(v).unwrap()
}

#[tokio::test]
async fn test_partial_batch_keeps_the_rest() {
    let ledger = Arc::new(MemoryLedger::new(1));
    for id in 1..=10 {
        ledger.seed_rating(id, Address::repeat_byte(1), score((id % 5 + 1) as u8));
    }
    ledger.set_faults(LedgerFaults {
        unreachable_models: [4].into_iter().collect(),
        ..LedgerFaults::default()
    });

    let aggregator = ReputationAggregator::new(ledger, AggregatorConfig::default());
    let view = aggregator.load(catalog(10), None).await;

    assert_eq!(view.entries.len(), 10);
    assert_eq!(view.entries.iter().filter(|e| e.snapshot.is_some()).count(), 9);
    assert_eq!(view.rated().count(), 9);

    let failed = view.get(4).unwrap();
    assert!(failed.snapshot.is_none());
    assert_eq!(failed.total_ratings(), 0);
    assert_eq!(failed.rank, None);
    assert_eq!(view.entries.last().unwrap().model.id, 4);
}

#[tokio::test]
async fn test_user_ratings_loaded_for_caller() {
    let me = Address::repeat_byte(0xee);
    let ledger = Arc::new(MemoryLedger::new(1));
    ledger.seed_rating(2, me, score(3));

    let aggregator = ReputationAggregator::new(ledger, AggregatorConfig::default());
    let view = aggregator.load(catalog(3), Some(me)).await;

    let mine = view.get(2).unwrap().user_rating.unwrap();
    assert_eq!(mine.score, score(3));
    assert!(!mine.optimistic);
    assert!(view.get(1).unwrap().user_rating.is_none());
}

#[tokio::test]
async fn test_missing_total_leaves_it_unknown() {
    let ledger = Arc::new(MemoryLedger::new(1));
    ledger.seed_rating(1, Address::repeat_byte(1), score(5));
    ledger.set_faults(LedgerFaults {
        total_unavailable: true,
        ..LedgerFaults::default()
    });

    let aggregator = ReputationAggregator::new(ledger, AggregatorConfig::default());
    let view = aggregator.load(catalog(2), None).await;

    assert_eq!(view.total_ratings, None);
    assert_eq!(view.get(1).unwrap().total_ratings(), 1);
}

#[tokio::test]
async fn test_load_user_comment() {
    let me = Address::repeat_byte(0xee);
    let ledger = Arc::new(MemoryLedger::new(1));
    let store = MemoryOffchainStore::with_models(catalog(2));
    store.insert_review(modelrep_core::Review {
        model_id: 2,
        reviewer: me,
        score: score(4),
        comment: Some("solid".into()),
        tag: None,
        tx_hash: Default::default(),
        created_at: chrono::Utc::now(),
    });

    let aggregator = ReputationAggregator::new(ledger, AggregatorConfig::default());
    aggregator.load(catalog(2), Some(me)).await;

    let comment = aggregator.load_user_comment(2, me, &store).await.unwrap();
    assert_eq!(comment.as_deref(), Some("solid"));
    assert_eq!(
        aggregator.view().get(2).unwrap().user_comment.as_deref(),
        Some("solid")
    );

    // a full reload starts over; comments are loaded on demand
    aggregator.load(catalog(2), Some(me)).await;
    assert!(aggregator.view().get(2).unwrap().user_comment.is_none());
}

/// Ledger that records what was published before each read and how many
/// reads overlap.
struct ProbeLedger {
    inner: MemoryLedger,
    view: OnceLock<watch::Receiver<Arc<RankedView>>>,
    seen: Mutex<Vec<(u64, usize)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    total_reads: AtomicUsize,
}

impl ProbeLedger {
    fn new() -> Self {
        Self {
            inner: MemoryLedger::new(1),
            view: OnceLock::new(),
            seen: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            total_reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LedgerReader for ProbeLedger {
    async fn reputation(&self, model_id: u64) -> modelrep_chain::Result<ReputationSnapshot> {
        let published = self.view.get().map(|rx| rx.borrow().entries.len()).unwrap_or(0);
        self.seen.lock().unwrap().push((model_id, published));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.inner.reputation(model_id).await
    }

    async fn user_rating(&self, model_id: u64, rater: Address) -> modelrep_chain::Result<Option<Score>> {
        self.inner.user_rating(model_id, rater).await
    }

    async fn total_ratings(&self) -> modelrep_chain::Result<u64> {
        self.total_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.total_ratings().await
    }
}

#[tokio::test]
async fn test_batches_are_bounded_and_published_in_order() {
    let ledger = Arc::new(ProbeLedger::new());
    let aggregator = ReputationAggregator::new(ledger.clone(), AggregatorConfig::default());
    ledger.view.set(aggregator.subscribe()).unwrap();

    let view = aggregator.load(catalog(25), None).await;

    assert_eq!(view.entries.len(), 25);
    assert!(view.is_complete());
    assert_eq!(ledger.max_in_flight.load(Ordering::SeqCst), 10);
    assert_eq!(ledger.total_reads.load(Ordering::SeqCst), 1);

    // every read saw exactly the batches merged before its own
    let seen = ledger.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 25);
    for (model_id, published) in seen {
        let expected = ((model_id as usize - 1) / 10) * 10;
        assert_eq!(published, expected, "model {}", model_id);
    }
}

#[tokio::test]
async fn test_progress_is_observable() {
    let ledger = Arc::new(MemoryLedger::new(1));
    let aggregator = ReputationAggregator::new(ledger, AggregatorConfig::with_batch_size(4));
    let rx = aggregator.subscribe();

    aggregator.load(catalog(9), None).await;

    assert!(rx.has_changed().unwrap());
    let latest = rx.borrow().clone();
    assert_eq!(latest.entries.len(), 9);
    assert_eq!(latest.pending, 0);
}
