//! Serper.dev search adapter.
//!
//! One POST per query with the API key in `X-API-KEY`. Transient failures
//! (5xx, transport) get a single jittered retry; 4xx responses do not.

use std::time::Duration;

use rand::Rng;

use super::{SearchProvider, SearchResponse};
use crate::error::ProviderError;
use crate::redact::redact_secrets;

/// Default Serper API endpoint.
const SERPER_BASE_URL: &str = "https://google.serper.dev";

/// Search adapter backed by serper.dev.
pub struct SerperClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl SerperClient {
    /// Create a client with the default base URL.
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::with_base_url(api_key, timeout, SERPER_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(api_key: String, timeout: Duration, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            timeout,
        }
    }

    async fn search_once(&self, query: &str) -> Result<SearchResponse, ProviderError> {
        tracing::debug!(query = %query, "search request");

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "q": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: redact_secrets(&body),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(format!("search response: {e}")))?;

        tracing::debug!(organic = parsed.organic.len(), "search response");
        Ok(parsed)
    }

    fn is_transient(err: &ProviderError) -> bool {
        match err {
            ProviderError::Request(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for SerperClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError> {
        match self.search_once(query).await {
            Ok(response) => Ok(response),
            Err(err) if Self::is_transient(&err) => {
                let jitter_ms = rand::thread_rng().gen_range(250..500);
                tracing::debug!(error = %err, jitter_ms, "transient search failure, retrying once");
                tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                self.search_once(query).await
            }
            Err(err) => Err(err),
        }
    }
}
