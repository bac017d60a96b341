//! In-process review store.
//!
//! Same upsert rule as the deployed service: one review per
//! `(model_id, reviewer)`, replaced on every save. Backs the development
//! server and the engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use ethers_core::types::Address;
use modelrep_core::{Model, Review};

use crate::error::{OffchainError, Result};
use crate::store::{OffchainStore, ReviewSubmission};

/// Thread-safe in-memory review store.
#[derive(Debug, Default)]
pub struct MemoryOffchainStore {
    models: RwLock<Vec<Model>>,
    reviews: RwLock<HashMap<(u64, Address), Review>>,
    unavailable: AtomicBool,
}

impl MemoryOffchainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(models: Vec<Model>) -> Self {
        Self {
            models: RwLock::new(models),
            ..Self::default()
        }
    }

    /// Simulate an outage: every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stored review for `(model_id, reviewer)`, if any.
    pub fn review(&self, model_id: u64, reviewer: Address) -> Option<Review> {
        self.reviews
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(model_id, reviewer))
            .cloned()
    }

    pub fn review_count(&self) -> usize {
        self.reviews.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Insert a review as-is (e.g. one with no ledger counterpart).
    pub fn insert_review(&self, review: Review) {
        self.reviews
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((review.model_id, review.reviewer), review);
    }

    /// Reviews for a numeric model id, newest first.
    pub fn reviews_for(&self, model_id: u64) -> Vec<Review> {
        let mut reviews: Vec<Review> = self
            .reviews
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.model_id == model_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reviews
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OffchainError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl OffchainStore for MemoryOffchainStore {
    async fn list_models(&self) -> Result<Vec<Model>> {
        self.ensure_available()?;
        Ok(self.models.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn model_reviews(&self, external_id: &str) -> Result<Vec<Review>> {
        self.ensure_available()?;
        let model_id = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|m| m.external_id == external_id)
            .map(|m| m.id)
            .ok_or_else(|| OffchainError::NotFound(format!("model '{}'", external_id)))?;
        Ok(self.reviews_for(model_id))
    }

    async fn user_comment(&self, model_id: u64, reviewer: Address) -> Result<Option<String>> {
        self.ensure_available()?;
        Ok(self.review(model_id, reviewer).and_then(|r| r.comment))
    }

    async fn save_review(&self, submission: &ReviewSubmission) -> Result<()> {
        self.ensure_available()?;
        if let Some(comment) = &submission.comment {
            let len = comment.chars().count();
            if len > modelrep_core::MAX_COMMENT_CHARS {
                return Err(modelrep_core::CoreError::CommentTooLong {
                    len,
                    max: modelrep_core::MAX_COMMENT_CHARS,
                }
                .into());
            }
        }

        let review = Review {
            model_id: submission.model_id,
            reviewer: submission.address,
            score: submission.score,
            comment: submission.comment.clone(),
            tag: submission.tag,
            tx_hash: submission.tx_hash,
            created_at: Utc::now(),
        };
        self.insert_review(review);
        Ok(())
    }
}
