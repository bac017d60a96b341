//! HTTP client for the review API.

use std::time::Duration;

use async_trait::async_trait;
use ethers_core::types::Address;
use modelrep_core::{Model, Review};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{OffchainError, Result};
use crate::store::{CheckResponse, OffchainStore, ReviewSubmission, ReviewsResponse};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body kept in `OffchainError::Status`.
const MAX_ERROR_BODY: usize = 200;

/// Review store reached over HTTP.
///
/// # Example
///
/// ```rust,no_run
/// use modelrep_offchain::{HttpOffchainStore, OffchainStore};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let store = HttpOffchainStore::new("http://localhost:8080")?;
/// for model in store.list_models().await? {
///     println!("{} {}", model.id, model.display_name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpOffchainStore {
    client: Client,
    base_url: Url,
}

impl HttpOffchainStore {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| OffchainError::ConfigError(format!("Invalid API URL: {}", e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(OffchainError::ConfigError(format!(
                "API URL must be http(s), got '{}'",
                base_url.scheme()
            )));
        }
        // keep any path prefix when joining
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OffchainError::ConfigError(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| OffchainError::ConfigError(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, query: &[(&str, String)]) -> Result<T> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| OffchainError::NetworkError(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| OffchainError::InvalidResponse(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        body.truncate(cut);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(OffchainError::NotFound(url));
    }
    Err(OffchainError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl OffchainStore for HttpOffchainStore {
    async fn list_models(&self) -> Result<Vec<Model>> {
        self.get_json(self.url("models")?, &[]).await
    }

    async fn model_reviews(&self, external_id: &str) -> Result<Vec<Review>> {
        // external ids contain '/', so encode as a single path segment
        let mut url = self.url("reputation/model")?;
        url.path_segments_mut()
            .map_err(|_| OffchainError::ConfigError("API URL cannot be a base".to_string()))?
            .push(external_id);

        let response: ReviewsResponse = self.get_json(url, &[]).await?;
        Ok(response.recent_reviews)
    }

    async fn user_comment(&self, model_id: u64, reviewer: Address) -> Result<Option<String>> {
        let url = self.url(&format!("reputation/check/{}", model_id))?;
        let response: CheckResponse = self
            .get_json(url, &[("address", format!("{:?}", reviewer))])
            .await?;
        Ok(response.rating.and_then(|r| r.comment))
    }

    async fn save_review(&self, submission: &ReviewSubmission) -> Result<()> {
        let url = self.url("reputation/rate")?;
        debug!(%url, model_id = submission.model_id, "POST");

        let response = self
            .client
            .post(url)
            .json(submission)
            .send()
            .await
            .map_err(|e| OffchainError::NetworkError(e.to_string()))?;

        if let Err(e) = check_status(response).await {
            warn!(model_id = submission.model_id, tx_hash = ?submission.tx_hash, error = %e, "review upsert failed");
            return Err(e);
        }
        Ok(())
    }
}
