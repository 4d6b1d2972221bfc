//! Error types for the Rowbot core library.
//!
//! Each boundary has its own error enum to provide clear error surfaces.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from external data providers (search, scrape, email finder).
///
/// The reliability stack treats these uniformly: a failure is recorded in
/// the provider's circuit breaker and stored as a negative cache entry.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider's circuit breaker refused the call.
    #[error("circuit open for provider '{provider}', retry in {retry_in_ms}ms")]
    CircuitOpen {
        /// The provider whose breaker is open.
        provider: String,
        /// Milliseconds until the breaker will allow a trial request.
        retry_in_ms: u64,
    },

    /// The provider call exceeded its timeout.
    #[error("provider '{provider}' timed out after {after_ms}ms")]
    Timeout {
        /// The provider that timed out.
        provider: String,
        /// The timeout that was exceeded, in milliseconds.
        after_ms: u64,
    },

    /// Network-level failure reaching the provider.
    #[error("provider HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned an error response.
    #[error("provider API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the provider, secrets redacted.
        message: String,
    },

    /// Provider rate limit hit.
    #[error("provider rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The provider response could not be interpreted.
    #[error("bad provider response: {0}")]
    BadResponse(String),

    /// No credential is configured for the provider.
    #[error("provider '{provider}' not configured")]
    NotConfigured {
        /// The provider missing a credential.
        provider: String,
    },

    /// A coalesced flight's leader failed; waiters observe the same failure.
    #[error("coalesced call failed: {0}")]
    Coalesced(String),
}

/// Errors from LLM providers and structured extraction.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request to the LLM endpoint failed.
    #[error("LLM HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// LLM API returned an error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// LLM provider rate limit hit.
    #[error("LLM rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// LLM response could not be parsed.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The extractor returned a shape the schema forbids.
    #[error("LLM response violates schema: {0}")]
    Schema(String),

    /// No LLM provider configured.
    #[error("no LLM provider configured")]
    NotConfigured,
}

impl From<LlmError> for ProviderError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Request(source) => ProviderError::Request(source),
            LlmError::Api { status, message } => ProviderError::Api { status, message },
            LlmError::RateLimited { retry_after_secs } => {
                ProviderError::RateLimited { retry_after_secs }
            }
            LlmError::Parse(m) | LlmError::Schema(m) => ProviderError::BadResponse(m),
            LlmError::NotConfigured => ProviderError::NotConfigured {
                provider: "llm".to_string(),
            },
        }
    }
}

/// Errors from the durable key/value store backing the cache.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to connect to the SQLite store.
    #[error("store connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Store migration failed.
    #[error("store migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A store query failed.
    #[error("store query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },
}

/// Errors from executing a single tool.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The tool's required inputs are missing from the row.
    #[error("tool '{tool}' missing required input: {field}")]
    MissingInput {
        /// The tool id.
        tool: String,
        /// The absent input field.
        field: String,
    },

    /// A provider call inside the tool failed.
    #[error("tool '{tool}' provider failure: {source}")]
    Provider {
        /// The tool id.
        tool: String,
        /// The underlying provider error.
        #[source]
        source: ProviderError,
    },

    /// The tool is registered for planning but has no implementation.
    #[error("tool '{tool}' is registered but not implemented")]
    NotImplemented {
        /// The tool id.
        tool: String,
    },

    /// The tool is disabled by configuration.
    #[error("tool '{tool}' is disabled")]
    Disabled {
        /// The tool id.
        tool: String,
    },
}

/// Terminal enrichment states surfaced to the caller.
///
/// Mirrors the cell-level status the operator sees. `kind()` returns the
/// machine tag used in diagnostics and the job-runner contract.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// The classifier decided the row cannot be enriched, or plan
    /// generation found no runnable steps. No external calls were made.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Why the input is unusable.
        reason: String,
    },

    /// The workflow completed but produced no value for the target field.
    #[error("not found: {reason}")]
    NotFound {
        /// What could not be produced, and why.
        reason: String,
    },

    /// A required provider's breaker is open and the plan cannot proceed.
    #[error("circuit open for provider '{provider}', retry in {retry_in_ms}ms")]
    CircuitOpen {
        /// The unavailable provider.
        provider: String,
        /// Milliseconds until the breaker will allow a trial request.
        retry_in_ms: u64,
    },

    /// The caller's deadline was exceeded before the plan completed.
    #[error("deadline exceeded after step {completed_steps}")]
    Deadline {
        /// Number of steps that completed before the deadline hit.
        completed_steps: usize,
    },
}

impl EnrichError {
    /// Machine tag for diagnostics and the job-runner contract.
    pub fn kind(&self) -> &'static str {
        match self {
            EnrichError::InvalidInput { .. } => "INVALID_INPUT",
            EnrichError::NotFound { .. } => "NOT_FOUND",
            EnrichError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            EnrichError::Deadline { .. } => "DEADLINE",
        }
    }

    /// The human reason, without the kind prefix, as shown to operators.
    pub fn reason(&self) -> String {
        match self {
            EnrichError::InvalidInput { reason } | EnrichError::NotFound { reason } => {
                reason.clone()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_field_message() {
        let err = ConfigError::MissingField {
            field: "providers.serper_api_key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required config field: providers.serper_api_key"
        );
    }

    #[test]
    fn config_error_invalid_value_message() {
        let err = ConfigError::InvalidValue {
            field: "llm.provider".to_string(),
            message: "must be openai, anthropic, or ollama".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for config field 'llm.provider': must be openai, anthropic, or ollama"
        );
    }

    #[test]
    fn provider_error_circuit_open_message() {
        let err = ProviderError::CircuitOpen {
            provider: "serper".to_string(),
            retry_in_ms: 12_000,
        };
        assert_eq!(
            err.to_string(),
            "circuit open for provider 'serper', retry in 12000ms"
        );
    }

    #[test]
    fn provider_error_timeout_message() {
        let err = ProviderError::Timeout {
            provider: "scrape".to_string(),
            after_ms: 8000,
        };
        assert_eq!(err.to_string(), "provider 'scrape' timed out after 8000ms");
    }

    #[test]
    fn provider_error_not_configured_message() {
        let err = ProviderError::NotConfigured {
            provider: "prospeo".to_string(),
        };
        assert_eq!(err.to_string(), "provider 'prospeo' not configured");
    }

    #[test]
    fn llm_error_schema_message() {
        let err = LlmError::Schema("unexpected field 'surprise'".to_string());
        assert_eq!(
            err.to_string(),
            "LLM response violates schema: unexpected field 'surprise'"
        );
    }

    #[test]
    fn llm_error_converts_to_provider_error() {
        let err: ProviderError = LlmError::NotConfigured.into();
        match err {
            ProviderError::NotConfigured { provider } => assert_eq!(provider, "llm"),
            other => panic!("expected NotConfigured, got: {other}"),
        }
    }

    #[test]
    fn tool_error_not_implemented_message() {
        let err = ToolError::NotImplemented {
            tool: "detect_tech_stack".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "tool 'detect_tech_stack' is registered but not implemented"
        );
    }

    #[test]
    fn enrich_error_kinds() {
        assert_eq!(
            EnrichError::InvalidInput {
                reason: "x".into()
            }
            .kind(),
            "INVALID_INPUT"
        );
        assert_eq!(
            EnrichError::NotFound { reason: "x".into() }.kind(),
            "NOT_FOUND"
        );
        assert_eq!(
            EnrichError::CircuitOpen {
                provider: "serper".into(),
                retry_in_ms: 1
            }
            .kind(),
            "CIRCUIT_OPEN"
        );
        assert_eq!(EnrichError::Deadline { completed_steps: 2 }.kind(), "DEADLINE");
    }
}
