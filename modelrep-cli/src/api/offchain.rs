//! Review API routes over the in-memory store.
//!
//! Mirrors the deployed service: catalog, per-model reviews, the caller's
//! prior comment, and the review upsert.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ethers_core::types::Address;
use modelrep_offchain::{
    CheckResponse, CheckedRating, MemoryOffchainStore, OffchainError, OffchainStore, ReviewSubmission,
    ReviewsResponse,
};
use serde::Deserialize;
use tracing::{debug, warn};

type SharedStore = Arc<MemoryOffchainStore>;

#[derive(Debug, Deserialize)]
struct CheckQuery {
    address: Address,
}

/// Build the review API router.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/models", get(list_models))
        .route("/reputation/model/:external_id", get(model_reviews))
        .route("/reputation/check/:model_id", get(check_rating))
        .route("/reputation/rate", post(save_review))
        .with_state(store)
}

fn error_response(e: OffchainError) -> Response {
    let status = match &e {
        OffchainError::NotFound(_) => StatusCode::NOT_FOUND,
        OffchainError::Core(_) => StatusCode::BAD_REQUEST,
        OffchainError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

async fn list_models(State(store): State<SharedStore>) -> Response {
    match store.list_models().await {
        Ok(models) => Json(models).into_response(),
        Err(e) => error_response(e),
    }
}

async fn model_reviews(State(store): State<SharedStore>, Path(external_id): Path<String>) -> Response {
    match store.model_reviews(&external_id).await {
        Ok(recent_reviews) => Json(ReviewsResponse { recent_reviews }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn check_rating(
    State(store): State<SharedStore>,
    Path(model_id): Path<u64>,
    Query(query): Query<CheckQuery>,
) -> Json<CheckResponse> {
    let rating = store
        .review(model_id, query.address)
        .map(|review| CheckedRating { comment: review.comment });
    Json(CheckResponse { rating })
}

async fn save_review(State(store): State<SharedStore>, Json(submission): Json<ReviewSubmission>) -> Response {
    match store.save_review(&submission).await {
        Ok(()) => {
            debug!(model_id = submission.model_id, tx_hash = ?submission.tx_hash, "review stored");
            Json(serde_json::json!({ "ok": true })).into_response()
        }
        Err(e) => {
            warn!(model_id = submission.model_id, error = %e, "review rejected");
            error_response(e)
        }
    }
}
