//! Review store capability and its wire types.

use async_trait::async_trait;
use ethers_core::types::{Address, H256};
use modelrep_core::{Model, RatingRequest, Review, ReviewTag, Score};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Body of `POST /reputation/rate`.
///
/// Upserted by `(modelId, address)`. `txHash` must already be confirmed on
/// the ledger when this is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub model_id: u64,
    pub score: Score,
    pub comment: Option<String>,
    #[serde(rename = "tag1")]
    pub tag: Option<ReviewTag>,
    pub tx_hash: H256,
    pub address: Address,
}

impl ReviewSubmission {
    pub fn from_request(request: &RatingRequest, reviewer: Address, tx_hash: H256) -> Self {
        Self {
            model_id: request.model_id,
            score: request.score,
            comment: request.comment.clone(),
            tag: request.tag,
            tx_hash,
            address: reviewer,
        }
    }
}

/// Body of `GET /reputation/model/{externalId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsResponse {
    #[serde(default)]
    pub recent_reviews: Vec<Review>,
}

/// Body of `GET /reputation/check/{modelId}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckResponse {
    pub rating: Option<CheckedRating>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckedRating {
    #[serde(default)]
    pub comment: Option<String>,
}

/// Off-chain review store.
#[async_trait]
pub trait OffchainStore: Send + Sync {
    /// `GET /models`: the ratable model catalog.
    async fn list_models(&self) -> Result<Vec<Model>>;

    /// `GET /reputation/model/{externalId}`: recent reviews for one model.
    async fn model_reviews(&self, external_id: &str) -> Result<Vec<Review>>;

    /// `GET /reputation/check/{modelId}`: the reviewer's own prior comment.
    async fn user_comment(&self, model_id: u64, reviewer: Address) -> Result<Option<String>>;

    /// `POST /reputation/rate`: upsert the review for a confirmed rating.
    async fn save_review(&self, submission: &ReviewSubmission) -> Result<()>;
}
