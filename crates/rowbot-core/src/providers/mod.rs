//! External provider adapter contracts and wire types.
//!
//! The core consumes three HTTP-facing contracts -- search, page fetch, and
//! email finder -- plus the LLM extractor defined in [`crate::llm`]. Every
//! call passes through the reliability stack in [`stack`]:
//! cache → singleflight → circuit breaker → raw provider call.

pub mod html;
pub mod prospeo;
pub mod scrape;
pub mod serper;
pub mod stack;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

// ── Search ──────────────────────────────────────────────────────────

/// One organic search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicResult {
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Result URL.
    #[serde(default)]
    pub link: String,
    /// Result snippet.
    #[serde(default)]
    pub snippet: String,
    /// 1-based rank on the results page.
    #[serde(default)]
    pub position: u32,
}

/// Knowledge-graph block attached to some search responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    /// Entity title.
    #[serde(default)]
    pub title: Option<String>,
    /// Entity type label.
    #[serde(rename = "type", default)]
    pub kg_type: Option<String>,
    /// Entity description.
    #[serde(default)]
    pub description: Option<String>,
    /// Key/value attributes (e.g. "Founded", "Headquarters").
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A full search response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Organic results, best first.
    #[serde(default)]
    pub organic: Vec<OrganicResult>,
    /// Knowledge-graph block, when present.
    #[serde(rename = "knowledgeGraph", default)]
    pub knowledge_graph: Option<KnowledgeGraph>,
}

/// Web search adapter.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search query.
    async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError>;
}

// ── Page fetch ──────────────────────────────────────────────────────

/// Bounded HTML page fetcher.
///
/// `Ok(None)` means the server answered but there is no usable page
/// (non-2xx or an empty body). Transport failures are errors.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page, following redirects, bounded in size.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Option<String>, ProviderError>;
}

// ── Email finder ────────────────────────────────────────────────────

/// Result from an email-finder provider call.
///
/// `confidence` is normalized to [0, 1] regardless of the provider's own
/// scale. `email_status` carries the provider's raw verification string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailFinderResult {
    /// Whether the provider found an email.
    pub success: bool,
    /// The email, when found.
    #[serde(default)]
    pub email: Option<String>,
    /// Provider confidence normalized to [0, 1].
    #[serde(default)]
    pub confidence: f64,
    /// Raw provider verification string (e.g. "VALID", "ACCEPT_ALL").
    #[serde(default)]
    pub email_status: Option<String>,
    /// LinkedIn URL the provider matched, when available.
    #[serde(default)]
    pub linkedin_url: Option<String>,
    /// Person name the provider matched.
    #[serde(default)]
    pub person_name: Option<String>,
    /// Current company the provider reports.
    #[serde(default)]
    pub current_company: Option<String>,
    /// Current job title the provider reports.
    #[serde(default)]
    pub current_job_title: Option<String>,
    /// Provider error detail on failure.
    #[serde(default)]
    pub error: Option<String>,
}

/// Email-finder adapter with the two lookup shapes the pipeline uses.
#[async_trait::async_trait]
pub trait EmailFinder: Send + Sync {
    /// Look up a work email anchored on a LinkedIn profile URL.
    async fn by_linkedin(&self, linkedin_url: &str) -> Result<EmailFinderResult, ProviderError>;

    /// Look up a work email from a full name and a company domain.
    async fn by_name_company(
        &self,
        full_name: &str,
        domain: &str,
    ) -> Result<EmailFinderResult, ProviderError>;
}
