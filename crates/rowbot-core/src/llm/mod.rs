//! LLM provider abstraction tuned for structured extraction.
//!
//! Rowbot uses LLMs for exactly one thing: low-temperature, schema-bound
//! extraction over evidence the tools collected (snippets, page text).
//! Providers implement [`LlmProvider`]; tools consume the
//! [`extract::StructuredExtractor`] built on top, never free-form text.

pub mod anthropic;
pub mod extract;
pub mod factory;
pub mod openai_compat;

use crate::error::LlmError;

/// Token usage information from an LLM completion.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the input/prompt.
    pub input_tokens: u32,
    /// Number of tokens in the output/completion.
    pub output_tokens: u32,
}

/// Response from an LLM completion request.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,
    /// Token usage for this completion.
    pub usage: TokenUsage,
    /// The model that produced this response.
    pub model: String,
}

/// Parameters controlling LLM generation behavior.
///
/// Defaults are extraction defaults: bounded output, near-deterministic
/// sampling, JSON mode requested where the provider supports it.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature. Extraction call sites pin this to 0.1.
    pub temperature: f32,
    /// Ask the provider for a JSON-object response where supported.
    pub json_mode: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.1,
            json_mode: true,
        }
    }
}

/// Trait abstracting LLM provider operations.
///
/// Implementations include `OpenAiCompatProvider` (OpenAI and Ollama) and
/// `AnthropicProvider`. Object-safe for use as `Box<dyn LlmProvider>`.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the display name of this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Send a completion request to the LLM.
    async fn complete(
        &self,
        system: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse, LlmError>;
}
