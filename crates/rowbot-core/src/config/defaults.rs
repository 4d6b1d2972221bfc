//! Default values for all configuration sections.
//!
//! TTL and breaker defaults are the canonical policy values; callers never
//! guess their own.

use super::{BreakerConfig, CacheConfig, LoggingConfig, ProvidersConfig};

pub(super) fn cache_key_prefix() -> String {
    "enrich:v3".to_string()
}

pub(super) fn cache_version() -> u32 {
    1
}

pub(super) fn cache_default_ttl_secs() -> u64 {
    20 * 24 * 3600
}

pub(super) fn cache_email_ttl_secs() -> u64 {
    7 * 24 * 3600
}

pub(super) fn cache_negative_ttl_secs() -> u64 {
    24 * 3600
}

pub(super) fn cache_negative_long_ttl_secs() -> u64 {
    7 * 24 * 3600
}

pub(super) fn cache_max_memory_entries() -> usize {
    10_000
}

pub(super) fn cache_db_path() -> String {
    "~/.rowbot/cache.db".to_string()
}

pub(super) fn breaker_failure_threshold() -> u32 {
    5
}

pub(super) fn breaker_reset_timeout_ms() -> u64 {
    30_000
}

pub(super) fn breaker_success_threshold() -> u32 {
    3
}

pub(super) fn breaker_window_ms() -> u64 {
    60_000
}

pub(super) fn breaker_minimum_requests() -> u32 {
    10
}

pub(super) fn search_timeout_ms() -> u64 {
    5_000
}

pub(super) fn scrape_timeout_ms() -> u64 {
    8_000
}

pub(super) fn log_level() -> String {
    "info".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: cache_key_prefix(),
            version: cache_version(),
            default_ttl_secs: cache_default_ttl_secs(),
            email_ttl_secs: cache_email_ttl_secs(),
            negative_ttl_secs: cache_negative_ttl_secs(),
            negative_long_ttl_secs: cache_negative_long_ttl_secs(),
            max_memory_entries: cache_max_memory_entries(),
            db_path: cache_db_path(),
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: breaker_failure_threshold(),
            reset_timeout_ms: breaker_reset_timeout_ms(),
            success_threshold: breaker_success_threshold(),
            window_ms: breaker_window_ms(),
            minimum_requests: breaker_minimum_requests(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: log_level(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            serper_api_key: None,
            prospeo_api_key: None,
            search_timeout_ms: search_timeout_ms(),
            scrape_timeout_ms: scrape_timeout_ms(),
        }
    }
}

impl ProvidersConfig {
    /// Configured search timeout as a `Duration`.
    pub fn search_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.search_timeout_ms)
    }

    /// Configured scrape timeout as a `Duration`.
    pub fn scrape_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scrape_timeout_ms)
    }
}
