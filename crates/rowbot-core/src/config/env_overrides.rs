//! Environment variable overrides for configuration.

use std::env;

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables use the `ROWBOT_` prefix with double underscores
    /// separating nested keys (e.g., `ROWBOT_CACHE__VERSION`).
    pub(super) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Cache
        if let Ok(val) = env::var("ROWBOT_CACHE__KEY_PREFIX") {
            self.cache.key_prefix = val;
        }
        if let Ok(val) = env::var("ROWBOT_CACHE__VERSION") {
            self.cache.version = parse_env_u32("ROWBOT_CACHE__VERSION", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_CACHE__DEFAULT_TTL_SECS") {
            self.cache.default_ttl_secs = parse_env_u64("ROWBOT_CACHE__DEFAULT_TTL_SECS", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_CACHE__NEGATIVE_TTL_SECS") {
            self.cache.negative_ttl_secs = parse_env_u64("ROWBOT_CACHE__NEGATIVE_TTL_SECS", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_CACHE__MAX_MEMORY_ENTRIES") {
            self.cache.max_memory_entries =
                parse_env_u64("ROWBOT_CACHE__MAX_MEMORY_ENTRIES", &val)? as usize;
        }
        if let Ok(val) = env::var("ROWBOT_CACHE__DB_PATH") {
            self.cache.db_path = val;
        }

        // Breaker
        if let Ok(val) = env::var("ROWBOT_BREAKER__FAILURE_THRESHOLD") {
            self.breaker.failure_threshold =
                parse_env_u32("ROWBOT_BREAKER__FAILURE_THRESHOLD", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_BREAKER__RESET_TIMEOUT_MS") {
            self.breaker.reset_timeout_ms =
                parse_env_u64("ROWBOT_BREAKER__RESET_TIMEOUT_MS", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_BREAKER__SUCCESS_THRESHOLD") {
            self.breaker.success_threshold =
                parse_env_u32("ROWBOT_BREAKER__SUCCESS_THRESHOLD", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_BREAKER__WINDOW_MS") {
            self.breaker.window_ms = parse_env_u64("ROWBOT_BREAKER__WINDOW_MS", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_BREAKER__MINIMUM_REQUESTS") {
            self.breaker.minimum_requests =
                parse_env_u32("ROWBOT_BREAKER__MINIMUM_REQUESTS", &val)?;
        }

        // Providers
        if let Ok(val) = env::var("ROWBOT_PROVIDERS__SERPER_API_KEY") {
            self.providers.serper_api_key = Some(val);
        }
        if let Ok(val) = env::var("ROWBOT_PROVIDERS__PROSPEO_API_KEY") {
            self.providers.prospeo_api_key = Some(val);
        }
        if let Ok(val) = env::var("ROWBOT_PROVIDERS__SEARCH_TIMEOUT_MS") {
            self.providers.search_timeout_ms =
                parse_env_u64("ROWBOT_PROVIDERS__SEARCH_TIMEOUT_MS", &val)?;
        }
        if let Ok(val) = env::var("ROWBOT_PROVIDERS__SCRAPE_TIMEOUT_MS") {
            self.providers.scrape_timeout_ms =
                parse_env_u64("ROWBOT_PROVIDERS__SCRAPE_TIMEOUT_MS", &val)?;
        }

        // LLM
        if let Ok(val) = env::var("ROWBOT_LLM__PROVIDER") {
            self.llm.provider = val;
        }
        if let Ok(val) = env::var("ROWBOT_LLM__API_KEY") {
            self.llm.api_key = Some(val);
        }
        if let Ok(val) = env::var("ROWBOT_LLM__MODEL") {
            self.llm.model = val;
        }
        if let Ok(val) = env::var("ROWBOT_LLM__BASE_URL") {
            self.llm.base_url = Some(val);
        }

        // Logging
        if let Ok(val) = env::var("ROWBOT_LOGGING__LEVEL") {
            self.logging.level = val;
        }

        Ok(())
    }
}

fn parse_env_u32(var: &str, val: &str) -> Result<u32, ConfigError> {
    val.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
        field: var.to_string(),
        message: format!("'{val}' is not a valid integer"),
    })
}

fn parse_env_u64(var: &str, val: &str) -> Result<u64, ConfigError> {
    val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        field: var.to_string(),
        message: format!("'{val}' is not a valid integer"),
    })
}
