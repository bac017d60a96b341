//! Reputation aggregation over the rating ledger.
//!
//! Models are read in sequential batches; every model in a batch is read
//! concurrently. After each batch the merged view is published on a
//! `watch` channel, so subscribers see the ranking fill in progressively.
//! A failed read never aborts a batch: the model is shown without a
//! snapshot and counted as unrated.

use std::sync::Arc;

use ethers_core::types::Address;
use futures::future::join_all;
use modelrep_chain::LedgerReader;
use modelrep_core::{
    apply_optimistic, apply_refresh, attach_comment, merge_batch, set_total, BatchResult, Model,
    ModelFetch, ModelWithReputation, RankedView, Score,
};
use modelrep_offchain::OffchainStore;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// Models read concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Aggregator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub batch_size: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl AggregatorConfig {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

/// Loads ledger reputation for the catalog and keeps the ranked view.
pub struct ReputationAggregator {
    ledger: Arc<dyn LedgerReader>,
    config: AggregatorConfig,
    view_tx: watch::Sender<Arc<RankedView>>,
}

impl ReputationAggregator {
    pub fn new(ledger: Arc<dyn LedgerReader>, config: AggregatorConfig) -> Self {
        let (view_tx, _) = watch::channel(Arc::new(RankedView::default()));
        Self {
            ledger,
            config,
            view_tx,
        }
    }

    /// Receiver that observes every published view.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RankedView>> {
        self.view_tx.subscribe()
    }

    /// Current view snapshot.
    pub fn view(&self) -> Arc<RankedView> {
        self.view_tx.borrow().clone()
    }

    /// Replaces the view with a fresh load of `models`.
    ///
    /// With a `caller`, each model's user rating is read alongside its
    /// reputation. The ledger-wide total is read with the first batch.
    pub async fn load(&self, models: Vec<Model>, caller: Option<Address>) -> Arc<RankedView> {
        let count = models.len();
        let batch_size = self.config.batch_size.max(1);
        self.publish(|_| RankedView::loading(count));
        info!(models = count, batch_size, "loading reputation");

        if models.is_empty() {
            if let Some(total) = self.read_total().await {
                self.publish(|view| set_total(view, total));
            }
            return self.view();
        }

        let mut fetched = 0;
        for (index, chunk) in models.chunks(batch_size).enumerate() {
            let reads = join_all(chunk.iter().map(|m| self.fetch_for_load(m.clone(), caller)));

            let (fetches, total_ratings) = if index == 0 {
                tokio::join!(reads, self.read_total())
            } else {
                (reads.await, None)
            };

            fetched += chunk.len();
            let remaining = count - fetched;
            debug!(batch = index + 1, fetched, remaining, "batch merged");

            let batch = BatchResult {
                fetches,
                total_ratings,
                remaining,
            };
            self.publish(move |view| merge_batch(view, batch));
        }

        self.view()
    }

    /// Re-reads one model already in the view and applies the ledger values.
    ///
    /// # Errors
    ///
    /// `UnknownModel` if the model was never loaded. Failed reads are
    /// logged and leave the previous values in place.
    pub async fn refresh_model(&self, model_id: u64, caller: Option<Address>) -> Result<ModelWithReputation> {
        let model = self.known_model(model_id)?;
        let fetch = self.read_model(model, caller).await;
        self.publish(move |view| apply_refresh(view, fetch));

        self.view()
            .get(model_id)
            .cloned()
            .ok_or(EngineError::UnknownModel(model_id))
    }

    /// Re-reads the ledger-wide rating count.
    pub async fn refresh_total(&self) -> Result<u64> {
        let total = self.ledger.total_ratings().await?;
        self.publish(|view| set_total(view, total));
        Ok(total)
    }

    /// Shows `score` as the caller's rating until the next refresh.
    pub fn apply_optimistic(&self, model_id: u64, score: Score) {
        debug!(model_id, score = score.get(), "optimistic user rating");
        self.publish(|view| apply_optimistic(view, model_id, score));
    }

    /// Loads the caller's prior comment from the review store into the view.
    pub async fn load_user_comment(
        &self,
        model_id: u64,
        caller: Address,
        store: &dyn OffchainStore,
    ) -> Result<Option<String>> {
        self.known_model(model_id)?;
        let comment = store.user_comment(model_id, caller).await?;
        let attached = comment.clone();
        self.publish(move |view| attach_comment(view, model_id, attached));
        Ok(comment)
    }

    fn known_model(&self, model_id: u64) -> Result<Model> {
        self.view_tx
            .borrow()
            .get(model_id)
            .map(|e| e.model.clone())
            .ok_or(EngineError::UnknownModel(model_id))
    }

    fn publish(&self, f: impl FnOnce(&RankedView) -> RankedView) {
        self.view_tx.send_modify(|view| {
            let next = f(view.as_ref());
            *view = Arc::new(next);
        });
    }

    async fn read_total(&self) -> Option<u64> {
        match self.ledger.total_ratings().await {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(error = %e, "total ratings unavailable");
                None
            }
        }
    }

    /// Bulk-load read: any failed read for the model drops its snapshot.
    async fn fetch_for_load(&self, model: Model, caller: Option<Address>) -> ModelFetch {
        let fetch = self.read_model(model, caller).await;
        if caller.is_some() && !fetch.user_rating_known {
            return ModelFetch::failed(fetch.model);
        }
        fetch
    }

    async fn read_model(&self, model: Model, caller: Option<Address>) -> ModelFetch {
        let model_id = model.id;
        let (reputation, user_rating) = match caller {
            Some(rater) => {
                let (reputation, user_rating) = tokio::join!(
                    self.ledger.reputation(model_id),
                    self.ledger.user_rating(model_id, rater)
                );
                (reputation, Some(user_rating))
            }
            None => (self.ledger.reputation(model_id).await, None),
        };

        let fetch = match reputation {
            Ok(snapshot) => ModelFetch::loaded(model, snapshot),
            Err(e) => {
                warn!(model_id, error = %e, "reputation read failed");
                ModelFetch::failed(model)
            }
        };

        match user_rating {
            Some(Ok(score)) => fetch.with_user_rating(score),
            Some(Err(e)) => {
                warn!(model_id, error = %e, "user rating read failed");
                fetch
            }
            None => fetch,
        }
    }
}
