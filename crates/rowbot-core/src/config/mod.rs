//! Configuration management for Rowbot.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.rowbot/config.toml`)
//! 3. Environment variable overrides (`ROWBOT_` prefix)
//!
//! CLI flag overrides are applied by the binary crate after loading.

mod defaults;
mod env_overrides;
mod validation;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the Rowbot enrichment engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Cache key scheme, TTLs, and store settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Circuit breaker thresholds.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// External provider credentials and timeouts.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-tool enable flags (tool id -> enabled; absent means enabled).
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cache key scheme, TTL policy, and store settings.
///
/// TTL values are the canonical policy: callers never pick their own TTLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Key prefix for every cache entry.
    #[serde(default = "defaults::cache_key_prefix")]
    pub key_prefix: String,

    /// Cache schema version; bumping invalidates all prior entries.
    #[serde(default = "defaults::cache_version")]
    pub version: u32,

    /// TTL for positive entries (company profile, socials, size, search,
    /// LLM, scrape, LinkedIn artefacts), in seconds.
    #[serde(default = "defaults::cache_default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// TTL for email verification results, in seconds.
    #[serde(default = "defaults::cache_email_ttl_secs")]
    pub email_ttl_secs: u64,

    /// TTL for short-lived negative entries, in seconds.
    #[serde(default = "defaults::cache_negative_ttl_secs")]
    pub negative_ttl_secs: u64,

    /// TTL for long-lived negative entries, in seconds.
    #[serde(default = "defaults::cache_negative_long_ttl_secs")]
    pub negative_long_ttl_secs: u64,

    /// Bound on the in-process fallback LRU.
    #[serde(default = "defaults::cache_max_memory_entries")]
    pub max_memory_entries: usize,

    /// Path to the SQLite store file. Empty disables the durable store
    /// and the cache runs memory-only.
    #[serde(default = "defaults::cache_db_path")]
    pub db_path: String,
}

/// Circuit breaker thresholds, shared by every provider breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerConfig {
    /// Consecutive-failure count that opens the breaker.
    #[serde(default = "defaults::breaker_failure_threshold")]
    pub failure_threshold: u32,

    /// How long an open breaker waits before allowing a trial request.
    #[serde(default = "defaults::breaker_reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Successes required in half-open state to close the breaker.
    #[serde(default = "defaults::breaker_success_threshold")]
    pub success_threshold: u32,

    /// Rolling metrics window, in milliseconds.
    #[serde(default = "defaults::breaker_window_ms")]
    pub window_ms: u64,

    /// Minimum calls in the window before the breaker may open.
    #[serde(default = "defaults::breaker_minimum_requests")]
    pub minimum_requests: u32,
}

/// External provider credentials and timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// Serper.dev search API key.
    #[serde(default)]
    pub serper_api_key: Option<String>,

    /// Prospeo email-finder API key.
    #[serde(default)]
    pub prospeo_api_key: Option<String>,

    /// Search request timeout, in milliseconds.
    #[serde(default = "defaults::search_timeout_ms")]
    pub search_timeout_ms: u64,

    /// Page fetch timeout, in milliseconds.
    #[serde(default = "defaults::scrape_timeout_ms")]
    pub scrape_timeout_ms: u64,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    /// LLM provider name: "openai", "anthropic", or "ollama".
    #[serde(default)]
    pub provider: String,

    /// API key for the LLM provider (not needed for ollama).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Provider-specific model name.
    #[serde(default)]
    pub model: String,

    /// Override URL for custom endpoints.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Per-tool enable flags.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Map of tool id to enabled flag. Tools absent from the map are enabled.
    #[serde(default, flatten)]
    pub enabled: HashMap<String, bool>,
}

impl ToolsConfig {
    /// Whether a tool is enabled. Unlisted tools default to enabled.
    pub fn is_enabled(&self, tool_id: &str) -> bool {
        self.enabled.get(tool_id).copied().unwrap_or(true)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", or "trace".
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Config {
    /// Resolve the configuration file path.
    ///
    /// Returns `(path, explicit)` where `explicit` is true when the caller
    /// supplied a path (a missing explicit file is an error; a missing
    /// default file falls back to defaults).
    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        match config_path {
            Some(p) => (PathBuf::from(expand_tilde(p)), true),
            None => {
                let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
                (base.join(".rowbot").join("config.toml"), false)
            }
        }
    }

    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError { source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration and validate it, returning all validation errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }
}

/// Expand `~` at the start of a path to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.to_string_lossy().to_string();
        }
    }
    path.to_string()
}
