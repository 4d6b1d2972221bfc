//! Process-wide services threaded through the pipeline.
//!
//! One [`Services`] is created at process init and shared by every
//! enrichment task: cache, singleflight tables, breaker registry, and the
//! provider adapters. Tools never talk to providers directly; they go
//! through the typed wrappers here, which apply the reliability stack and
//! the canonical TTL policy.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::breaker::registry::BreakerRegistry;
use crate::cache::{key_digest, Cache};
use crate::config::Config;
use crate::error::ProviderError;
use crate::flight::Singleflight;
use crate::llm::extract::{LlmStructuredExtractor, StructuredExtractor};
use crate::llm::factory;
use crate::providers::prospeo::ProspeoClient;
use crate::providers::scrape::HttpFetcher;
use crate::providers::serper::SerperClient;
use crate::providers::stack::{self, CallSpec};
use crate::providers::{EmailFinder, EmailFinderResult, PageFetcher, SearchProvider, SearchResponse};

/// Breaker/flight name for the search provider.
pub const PROVIDER_SEARCH: &str = "serper";
/// Breaker/flight name for the LLM extractor.
pub const PROVIDER_LLM: &str = "llm";
/// Breaker/flight name for page fetches.
pub const PROVIDER_SCRAPE: &str = "scrape";
/// Breaker/flight name for the email finder.
pub const PROVIDER_EMAIL: &str = "prospeo";

/// Cost recorded per search call, cents.
const COST_SEARCH_CENTS: u32 = 1;
/// Cost recorded per LLM extraction, cents.
const COST_LLM_CENTS: u32 = 2;
/// Cost recorded per page fetch, cents.
const COST_SCRAPE_CENTS: u32 = 0;
/// Cost recorded per email-finder call, cents.
const COST_EMAIL_CENTS: u32 = 5;

/// Shared services for the enrichment pipeline.
pub struct Services {
    /// Loaded configuration.
    pub config: Config,
    /// The versioned cache.
    pub cache: Arc<Cache>,
    /// Cell-level singleflight (`cell:<rowId>:<field>`).
    pub cell_flights: Singleflight,
    /// Provider-level singleflight (`provider:<name>:<cacheKey>`).
    pub provider_flights: Singleflight,
    /// Per-provider circuit breakers.
    pub breakers: BreakerRegistry,
    search: Option<Arc<dyn SearchProvider>>,
    extractor: Option<Arc<dyn StructuredExtractor>>,
    fetcher: Arc<dyn PageFetcher>,
    email: Option<Arc<dyn EmailFinder>>,
}

impl Services {
    /// Build services from configuration, constructing real providers.
    ///
    /// Missing credentials do not fail init; the matching wrapper returns
    /// `ProviderError::NotConfigured` at call time so partially-configured
    /// deployments still run the tools they can.
    pub async fn init(config: Config) -> Self {
        let cache = Arc::new(Cache::open(&config.cache).await);

        let search: Option<Arc<dyn SearchProvider>> = config
            .providers
            .serper_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|key| {
                Arc::new(SerperClient::new(
                    key.to_string(),
                    config.providers.search_timeout(),
                )) as Arc<dyn SearchProvider>
            });

        let extractor: Option<Arc<dyn StructuredExtractor>> =
            match factory::create_provider(&config.llm) {
                Ok(provider) => Some(Arc::new(LlmStructuredExtractor::new(provider)) as _),
                Err(e) => {
                    tracing::warn!(error = %e, "LLM provider unavailable, extraction tools disabled");
                    None
                }
            };

        let email: Option<Arc<dyn EmailFinder>> = config
            .providers
            .prospeo_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|key| Arc::new(ProspeoClient::new(key.to_string())) as Arc<dyn EmailFinder>);

        Self::assemble(config, cache, search, extractor, Arc::new(HttpFetcher::new()), email)
    }

    /// Build services over explicit provider implementations (tests, fakes).
    pub fn with_providers(
        config: Config,
        cache: Arc<Cache>,
        search: Option<Arc<dyn SearchProvider>>,
        extractor: Option<Arc<dyn StructuredExtractor>>,
        fetcher: Arc<dyn PageFetcher>,
        email: Option<Arc<dyn EmailFinder>>,
    ) -> Self {
        Self::assemble(config, cache, search, extractor, fetcher, email)
    }

    fn assemble(
        config: Config,
        cache: Arc<Cache>,
        search: Option<Arc<dyn SearchProvider>>,
        extractor: Option<Arc<dyn StructuredExtractor>>,
        fetcher: Arc<dyn PageFetcher>,
        email: Option<Arc<dyn EmailFinder>>,
    ) -> Self {
        let breakers = BreakerRegistry::new(config.breaker.clone());
        Self {
            config,
            cache,
            cell_flights: Singleflight::new(),
            provider_flights: Singleflight::new(),
            breakers,
            search,
            extractor,
            fetcher,
            email,
        }
    }

    // ── Typed provider wrappers ─────────────────────────────────────

    /// Cached web search.
    ///
    /// A live negative entry (recent provider failure) yields an empty
    /// response so callers fall through their no-candidates path.
    pub async fn search(&self, query: &str) -> Result<SearchResponse, ProviderError> {
        let provider = self.search.clone().ok_or(ProviderError::NotConfigured {
            provider: PROVIDER_SEARCH.to_string(),
        })?;

        let spec = CallSpec {
            provider: PROVIDER_SEARCH,
            base_key: format!("search:{}", key_digest(query)),
            ttl: self.cache.default_ttl(),
            cost_cents: COST_SEARCH_CENTS,
            timeout: Some(self.config.providers.search_timeout()),
        };
        let query = query.to_string();
        let value = stack::call(
            &self.cache,
            &self.provider_flights,
            &self.breakers,
            spec,
            async move {
                let response = provider.search(&query).await?;
                let value = serde_json::to_value(&response)
                    .map_err(|e| ProviderError::BadResponse(e.to_string()))?;
                Ok(Some(value))
            },
        )
        .await?;

        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| ProviderError::BadResponse(format!("cached search entry: {e}"))),
            None => {
                tracing::debug!("negative search entry, returning empty response");
                Ok(SearchResponse::default())
            }
        }
    }

    /// Cached schema-bound LLM extraction.
    ///
    /// `Ok(None)` means a live negative entry short-circuited the call.
    pub async fn extract(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &Value,
        temperature: f32,
    ) -> Result<Option<Value>, ProviderError> {
        let extractor = self.extractor.clone().ok_or(ProviderError::NotConfigured {
            provider: PROVIDER_LLM.to_string(),
        })?;

        let digest = key_digest(&format!("{system_prompt}\n{user_prompt}\n{schema}"));
        let spec = CallSpec {
            provider: PROVIDER_LLM,
            base_key: format!("llm:{digest}"),
            ttl: self.cache.default_ttl(),
            cost_cents: COST_LLM_CENTS,
            // LLM timeouts are left to the provider SDK.
            timeout: None,
        };

        let system = system_prompt.to_string();
        let user = user_prompt.to_string();
        let schema = schema.clone();
        stack::call(
            &self.cache,
            &self.provider_flights,
            &self.breakers,
            spec,
            async move {
                let value = extractor
                    .extract_value(&system, &user, &schema, temperature)
                    .await?;
                Ok(Some(value))
            },
        )
        .await
    }

    /// Cached bounded page fetch. `Ok(None)` covers "no usable page",
    /// cached negatives, and recent fetch failures alike.
    pub async fn fetch_page(&self, url: &str) -> Result<Option<String>, ProviderError> {
        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.config.providers.scrape_timeout();

        let spec = CallSpec {
            provider: PROVIDER_SCRAPE,
            base_key: format!("scrape:{}", key_digest(url)),
            ttl: self.cache.default_ttl(),
            cost_cents: COST_SCRAPE_CENTS,
            timeout: Some(timeout + Duration::from_secs(1)),
        };
        let url = url.to_string();
        let value = stack::call(
            &self.cache,
            &self.provider_flights,
            &self.breakers,
            spec,
            async move {
                let html = fetcher.fetch(&url, timeout).await?;
                Ok(html.map(Value::String))
            },
        )
        .await?;

        Ok(value.and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Cached email lookup anchored on a LinkedIn URL.
    pub async fn find_email_by_linkedin(
        &self,
        linkedin_url: &str,
    ) -> Result<Option<EmailFinderResult>, ProviderError> {
        let provider = self.email.clone().ok_or(ProviderError::NotConfigured {
            provider: PROVIDER_EMAIL.to_string(),
        })?;

        let spec = CallSpec {
            provider: PROVIDER_EMAIL,
            base_key: format!("email:linkedin:{}", key_digest(linkedin_url)),
            ttl: self.cache.email_ttl(),
            cost_cents: COST_EMAIL_CENTS,
            timeout: None,
        };
        let url = linkedin_url.to_string();
        let value = stack::call(
            &self.cache,
            &self.provider_flights,
            &self.breakers,
            spec,
            async move {
                let result = provider.by_linkedin(&url).await?;
                if result.success {
                    let value = serde_json::to_value(&result)
                        .map_err(|e| ProviderError::BadResponse(e.to_string()))?;
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            },
        )
        .await?;

        decode_email_result(value)
    }

    /// Cached email lookup from name + company domain.
    pub async fn find_email_by_name(
        &self,
        full_name: &str,
        domain: &str,
    ) -> Result<Option<EmailFinderResult>, ProviderError> {
        let provider = self.email.clone().ok_or(ProviderError::NotConfigured {
            provider: PROVIDER_EMAIL.to_string(),
        })?;

        let spec = CallSpec {
            provider: PROVIDER_EMAIL,
            base_key: format!(
                "email:name:{}",
                key_digest(&format!("{full_name}@{domain}"))
            ),
            ttl: self.cache.email_ttl(),
            cost_cents: COST_EMAIL_CENTS,
            timeout: None,
        };
        let full_name = full_name.to_string();
        let domain = domain.to_string();
        let value = stack::call(
            &self.cache,
            &self.provider_flights,
            &self.breakers,
            spec,
            async move {
                let result = provider.by_name_company(&full_name, &domain).await?;
                if result.success {
                    let value = serde_json::to_value(&result)
                        .map_err(|e| ProviderError::BadResponse(e.to_string()))?;
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            },
        )
        .await?;

        decode_email_result(value)
    }
}

fn decode_email_result(
    value: Option<Value>,
) -> Result<Option<EmailFinderResult>, ProviderError> {
    match value {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ProviderError::BadResponse(format!("cached email entry: {e}"))),
        None => Ok(None),
    }
}
