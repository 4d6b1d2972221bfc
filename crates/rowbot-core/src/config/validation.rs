//! Configuration validation logic.

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Validate the configuration, returning all errors found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        // Cache
        if self.cache.key_prefix.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "cache.key_prefix".to_string(),
            });
        }
        if self.cache.max_memory_entries == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "cache.max_memory_entries".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.cache.default_ttl_secs == 0 || self.cache.negative_ttl_secs == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "cache TTLs".to_string(),
                message: "TTLs must be non-zero".to_string(),
            });
        }

        // Breaker
        if self.breaker.failure_threshold == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "breaker.failure_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.breaker.success_threshold == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "breaker.success_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.breaker.window_ms == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "breaker.window_ms".to_string(),
                message: "must be non-zero".to_string(),
            });
        }

        // LLM provider
        if !self.llm.provider.is_empty() {
            match self.llm.provider.as_str() {
                "openai" | "anthropic" | "ollama" => {}
                _ => {
                    errors.push(ConfigError::InvalidValue {
                        field: "llm.provider".to_string(),
                        message: "must be openai, anthropic, or ollama".to_string(),
                    });
                }
            }

            if matches!(self.llm.provider.as_str(), "openai" | "anthropic") {
                match &self.llm.api_key {
                    Some(key) if !key.is_empty() => {}
                    _ => {
                        errors.push(ConfigError::MissingField {
                            field: format!(
                                "llm.api_key (required for {} provider)",
                                self.llm.provider
                            ),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
