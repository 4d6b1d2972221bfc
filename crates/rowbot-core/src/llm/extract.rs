//! Schema-bound structured extraction over an LLM provider.
//!
//! Every LLM call in the enrichment pipeline goes through
//! [`StructuredExtractor`]: the response must be a single JSON object whose
//! keys are a subset of the supplied schema's properties. Anything else is a
//! [`LlmError::Schema`] and the adapter treats it as a provider failure --
//! free-form model output never flows into downstream data.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{GenerationParams, LlmProvider, LlmResponse};
use crate::error::LlmError;

/// Object-safe structured extraction interface.
///
/// Implementations must hold the response to the schema and keep
/// temperature low; call sites pass a JSON-schema object and a temperature
/// constant.
#[async_trait::async_trait]
pub trait StructuredExtractor: Send + Sync {
    /// Run an extraction and return the schema-validated JSON object.
    async fn extract_value(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &Value,
        temperature: f32,
    ) -> Result<Value, LlmError>;
}

/// Extractor backed by a real [`LlmProvider`].
pub struct LlmStructuredExtractor {
    provider: std::sync::Arc<dyn LlmProvider>,
}

impl LlmStructuredExtractor {
    /// Wrap a provider.
    pub fn new(provider: std::sync::Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl StructuredExtractor for LlmStructuredExtractor {
    async fn extract_value(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &Value,
        temperature: f32,
    ) -> Result<Value, LlmError> {
        let schema_text = serde_json::to_string_pretty(schema)
            .map_err(|e| LlmError::Schema(format!("unserializable schema: {e}")))?;

        let system = format!(
            "{system_prompt}\n\n\
             Respond with a single JSON object that conforms to this schema. \
             Do not add fields that are not in the schema. \
             Use null for any field the evidence does not explicitly support. \
             Never guess.\n\nSchema:\n{schema_text}"
        );

        let params = GenerationParams {
            temperature,
            ..GenerationParams::default()
        };

        let response: LlmResponse = self
            .provider
            .complete(&system, user_prompt, &params)
            .await?;

        let parsed = parse_json_response(&response.text)?;
        validate_against_schema(&parsed, schema)?;
        Ok(parsed)
    }
}

/// Deserialize an extraction result into a typed struct.
///
/// The target type should use `#[serde(deny_unknown_fields)]` so schema
/// drift fails loudly here rather than downstream.
pub async fn extract_as<T: DeserializeOwned>(
    extractor: &dyn StructuredExtractor,
    system_prompt: &str,
    user_prompt: &str,
    schema: &Value,
    temperature: f32,
) -> Result<T, LlmError> {
    let value = extractor
        .extract_value(system_prompt, user_prompt, schema, temperature)
        .await?;
    serde_json::from_value(value).map_err(|e| LlmError::Schema(e.to_string()))
}

/// Parse the model's reply as a JSON object, tolerating code fences.
fn parse_json_response(text: &str) -> Result<Value, LlmError> {
    let trimmed = strip_code_fences(text);
    let parsed: Value = serde_json::from_str(trimmed)
        .map_err(|e| LlmError::Parse(format!("response is not valid JSON: {e}")))?;
    if !parsed.is_object() {
        return Err(LlmError::Schema("response is not a JSON object".to_string()));
    }
    Ok(parsed)
}

/// Reject responses carrying fields the schema does not declare.
fn validate_against_schema(response: &Value, schema: &Value) -> Result<(), LlmError> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    let Some(object) = response.as_object() else {
        return Err(LlmError::Schema("response is not a JSON object".to_string()));
    };
    for key in object.keys() {
        if !properties.contains_key(key) {
            return Err(LlmError::Schema(format!(
                "unexpected field '{key}' not present in schema"
            )));
        }
    }
    Ok(())
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}
