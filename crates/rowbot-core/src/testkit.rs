//! In-process fake providers for tool and executor tests.
//!
//! Provider HTTP implementations are tested with wiremock in their own
//! modules; everything above the adapter traits is tested against these
//! fakes, which match canned responses by substring so tests read as
//! scenarios rather than fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::cache::Cache;
use crate::config::{CacheConfig, Config};
use crate::error::{LlmError, ProviderError};
use crate::llm::extract::StructuredExtractor;
use crate::providers::{
    EmailFinder, EmailFinderResult, OrganicResult, PageFetcher, SearchProvider, SearchResponse,
};
use crate::service::Services;

/// Search fake: canned responses matched by query substring.
#[derive(Default)]
pub struct FakeSearch {
    responses: Mutex<Vec<(String, SearchResponse)>>,
    /// Number of searches issued.
    pub calls: AtomicU32,
}

impl FakeSearch {
    /// Create an empty fake (every query yields an empty response).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for queries containing `needle`.
    pub fn on(self, needle: &str, response: SearchResponse) -> Self {
        self.responses
            .lock()
            .expect("fake search lock")
            .push((needle.to_string(), response));
        self
    }

    /// Number of searches issued so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().expect("fake search lock");
        Ok(responses
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_default())
    }
}

/// Extractor fake: canned JSON objects matched by prompt substring.
#[derive(Default)]
pub struct FakeExtractor {
    responses: Mutex<Vec<(String, Value)>>,
    /// Number of extractions issued.
    pub calls: AtomicU32,
}

impl FakeExtractor {
    /// Create an empty fake (every extraction errors).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for prompts containing `needle` (checked against
    /// the user prompt, then the system prompt).
    pub fn on(self, needle: &str, value: Value) -> Self {
        self.responses
            .lock()
            .expect("fake extractor lock")
            .push((needle.to_string(), value));
        self
    }

    /// Number of extractions issued so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StructuredExtractor for FakeExtractor {
    async fn extract_value(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _schema: &Value,
        _temperature: f32,
    ) -> Result<Value, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().expect("fake extractor lock");
        responses
            .iter()
            .find(|(needle, _)| {
                user_prompt.contains(needle.as_str()) || system_prompt.contains(needle.as_str())
            })
            .map(|(_, v)| v.clone())
            .ok_or_else(|| LlmError::Parse("no canned extraction matches".to_string()))
    }
}

/// Page fetcher fake: canned HTML matched by URL substring.
#[derive(Default)]
pub struct FakePages {
    pages: Mutex<HashMap<String, String>>,
    /// Number of fetches issued.
    pub calls: AtomicU32,
}

impl FakePages {
    /// Create an empty fake (every fetch yields no page).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register HTML for URLs containing `needle`.
    pub fn on(self, needle: &str, html: &str) -> Self {
        self.pages
            .lock()
            .expect("fake pages lock")
            .insert(needle.to_string(), html.to_string());
        self
    }

    /// Number of fetches issued so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PageFetcher for FakePages {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Option<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(
            !url.contains("linkedin.com"),
            "person tools must never fetch linkedin.com (got {url})"
        );
        let pages = self.pages.lock().expect("fake pages lock");
        Ok(pages
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, html)| html.clone()))
    }
}

/// Email-finder fake with fixed answers per lookup shape.
#[derive(Default)]
pub struct FakeEmail {
    /// Answer for LinkedIn-anchored lookups.
    pub by_linkedin: Option<EmailFinderResult>,
    /// Answer for name+domain lookups.
    pub by_name: Option<EmailFinderResult>,
    /// Number of lookups issued.
    pub calls: AtomicU32,
}

impl FakeEmail {
    /// Create a fake that finds nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the LinkedIn-anchored answer.
    pub fn linkedin_answer(mut self, result: EmailFinderResult) -> Self {
        self.by_linkedin = Some(result);
        self
    }

    /// Set the name+domain answer.
    pub fn name_answer(mut self, result: EmailFinderResult) -> Self {
        self.by_name = Some(result);
        self
    }
}

#[async_trait::async_trait]
impl EmailFinder for FakeEmail {
    async fn by_linkedin(&self, _url: &str) -> Result<EmailFinderResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_linkedin.clone().unwrap_or_default())
    }

    async fn by_name_company(
        &self,
        _full_name: &str,
        _domain: &str,
    ) -> Result<EmailFinderResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_name.clone().unwrap_or_default())
    }
}

/// Build a memory-only cache config for tests.
pub fn test_cache_config() -> CacheConfig {
    CacheConfig {
        db_path: String::new(),
        ..CacheConfig::default()
    }
}

/// Assemble [`Services`] over fakes. Pass `None` to leave a provider
/// unconfigured (its wrapper then returns `NotConfigured`).
pub async fn fake_services(
    search: Option<Arc<FakeSearch>>,
    extractor: Option<Arc<FakeExtractor>>,
    pages: Option<Arc<FakePages>>,
    email: Option<Arc<FakeEmail>>,
) -> Services {
    let cache = Arc::new(Cache::with_store(&test_cache_config(), None).await);
    Services::with_providers(
        Config::default(),
        cache,
        search.map(|s| s as Arc<dyn SearchProvider>),
        extractor.map(|e| e as Arc<dyn StructuredExtractor>),
        pages
            .map(|p| p as Arc<dyn PageFetcher>)
            .unwrap_or_else(|| Arc::new(FakePages::new())),
        email.map(|e| e as Arc<dyn EmailFinder>),
    )
}

/// Shorthand for an organic search hit.
pub fn hit(position: u32, title: &str, link: &str, snippet: &str) -> OrganicResult {
    OrganicResult {
        title: title.to_string(),
        link: link.to_string(),
        snippet: snippet.to_string(),
        position,
    }
}

/// Shorthand for a search response with organic hits only.
pub fn organic(hits: Vec<OrganicResult>) -> SearchResponse {
    SearchResponse {
        organic: hits,
        knowledge_graph: None,
    }
}
