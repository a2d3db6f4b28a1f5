//! Brewfather API client
//!
//! Authenticated GETs against the batch endpoints. Every public method
//! degrades to `None` on failure (logged at warn); callers treat that as
//! "no data" and never see transport errors.

use crate::source::normalizer::{normalize_batch, normalize_summaries};
use brewlabel_common::config::Credentials;
use brewlabel_common::db::models::{BatchRecord, BatchSummary};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("brewlabel/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Brewfather client errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// API returned an error response
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse API response JSON
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Brewfather API client
pub struct BrewfatherClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl BrewfatherClient {
    /// Create new client for `base_url` (e.g. `https://api.brewfather.app/v2`)
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Raw listing of completed batches, newest brew date first
    pub async fn get_batches(&self, limit: u32) -> Option<Value> {
        let endpoint = format!(
            "/batches?complete=True&order_by=brewDate&order_by_direction=desc&limit={}",
            limit
        );
        self.request(&endpoint).await
    }

    /// Listing-mode summaries
    pub async fn list_batches(&self, limit: u32) -> Option<Vec<BatchSummary>> {
        let raw = self.get_batches(limit).await?;
        if !raw.is_array() {
            warn!("Unexpected batch listing shape (not an array)");
            return None;
        }
        Some(normalize_summaries(&raw))
    }

    /// Raw detail for one batch
    pub async fn get_batch(&self, batch_id: &str) -> Option<Value> {
        self.request(&format!("/batches/{}", batch_id)).await
    }

    /// Normalized detail for one batch
    pub async fn fetch_batch(&self, batch_id: &str) -> Option<BatchRecord> {
        let raw = self.get_batch(batch_id).await?;
        if !raw.is_object() {
            warn!(batch_id = %batch_id, "Unexpected batch detail shape (not an object)");
            return None;
        }
        Some(normalize_batch(&raw))
    }

    /// Ids of the most recent batches
    pub async fn batch_ids(&self, limit: u32) -> Option<Vec<String>> {
        let summaries = self.list_batches(limit).await?;
        Some(summaries.into_iter().filter_map(|s| s.id).collect())
    }

    async fn request(&self, endpoint: &str) -> Option<Value> {
        match self.get_json(endpoint).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(endpoint = %endpoint, "Brewfather request failed: {}", e);
                None
            }
        }
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value, SourceError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(url = %url, "Querying Brewfather API");

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.credentials.user_id, Some(&self.credentials.api_key))
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Api(status.as_u16(), error_text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}
