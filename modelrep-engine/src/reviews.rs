//! Reviews for one model, checked against the ledger.
//!
//! The review store is untrusted for scores: each review is looked up on
//! the ledger and only marked `Verified` when the reviewer's on-chain score
//! matches. The ledger snapshot is returned alongside and always takes
//! precedence over anything derived from reviews.

use std::sync::Arc;

use futures::future::join_all;
use modelrep_chain::LedgerReader;
use modelrep_core::{Model, ReputationSnapshot, Review};
use modelrep_offchain::OffchainStore;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;

/// Whether a review's score is backed by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Verified,
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledReview {
    #[serde(flatten)]
    pub review: Review,
    pub status: ReviewStatus,
}

/// A model's ledger snapshot and its reconciled reviews, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReviews {
    pub model: Model,
    /// `None` when the ledger read failed.
    pub snapshot: Option<ReputationSnapshot>,
    pub reviews: Vec<ReconciledReview>,
}

impl ModelReviews {
    pub fn verified(&self) -> impl Iterator<Item = &ReconciledReview> {
        self.reviews.iter().filter(|r| r.status == ReviewStatus::Verified)
    }
}

/// On-demand review loader.
pub struct ReviewFeed {
    ledger: Arc<dyn LedgerReader>,
    store: Arc<dyn OffchainStore>,
}

impl ReviewFeed {
    pub fn new(ledger: Arc<dyn LedgerReader>, store: Arc<dyn OffchainStore>) -> Self {
        Self { ledger, store }
    }

    /// Loads and reconciles the reviews for `model`.
    ///
    /// # Errors
    ///
    /// Review store failures. A failed ledger snapshot read only leaves
    /// `snapshot` empty.
    pub async fn load(&self, model: &Model) -> Result<ModelReviews> {
        let (snapshot, reviews) = tokio::join!(
            self.ledger.reputation(model.id),
            self.store.model_reviews(&model.external_id)
        );
        let reviews = reviews?;

        let snapshot = match snapshot {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(model_id = model.id, error = %e, "reputation read failed");
                None
            }
        };

        let mut reviews = join_all(reviews.into_iter().map(|review| self.reconcile(model.id, review))).await;
        reviews.sort_by(|a, b| b.review.created_at.cmp(&a.review.created_at));

        Ok(ModelReviews {
            model: model.clone(),
            snapshot,
            reviews,
        })
    }

    async fn reconcile(&self, model_id: u64, review: Review) -> ReconciledReview {
        let status = match self.ledger.user_rating(model_id, review.reviewer).await {
            Ok(Some(score)) if score == review.score => ReviewStatus::Verified,
            Ok(_) => ReviewStatus::Unconfirmed,
            Err(e) => {
                warn!(model_id, reviewer = ?review.reviewer, error = %e, "review lookup failed");
                ReviewStatus::Unconfirmed
            }
        };
        ReconciledReview { review, status }
    }
}
