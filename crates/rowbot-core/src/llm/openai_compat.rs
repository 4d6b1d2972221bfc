//! OpenAI-compatible LLM provider.
//!
//! Works with both OpenAI (cloud) and Ollama (local) since they share the
//! same chat completions request/response format. When `json_mode` is set,
//! the request carries `response_format: json_object` so the model is held
//! to a JSON reply at the API level.

use serde::{Deserialize, Serialize};

use super::{GenerationParams, LlmProvider, LlmResponse, TokenUsage};
use crate::error::LlmError;

/// An LLM provider using the OpenAI chat completions API format.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    provider_name: String,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(base_url: String, api_key: String, model: String, provider_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            provider_name,
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(
        &self,
        system: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse, LlmError> {
        tracing::debug!(
            provider = %self.provider_name,
            model = %self.model,
            max_tokens = params.max_tokens,
            json_mode = params.json_mode,
            "LLM extraction request",
        );

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            response_format: params.json_mode.then(|| ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }

            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            return Err(LlmError::Api { status, message });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("failed to parse chat completion: {e}")))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let usage = body.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
        });

        tracing::debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            chars = text.len(),
            "LLM extraction response",
        );

        Ok(LlmResponse {
            text,
            usage,
            model: body.model,
        })
    }
}

// --- Internal Serde types ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(
            server.uri(),
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            "openai".to_string(),
        )
    }

    #[tokio::test]
    async fn complete_success_with_json_mode() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"founded\": 2010}"}}],
            "model": "gpt-4o-mini",
            "usage": {"prompt_tokens": 50, "completion_tokens": 9}
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let resp = provider_for(&server)
            .complete("extract", "evidence", &GenerationParams::default())
            .await
            .expect("complete");

        assert_eq!(resp.text, "{\"founded\": 2010}");
        assert_eq!(resp.usage.output_tokens, 9);
    }

    #[tokio::test]
    async fn json_mode_omitted_when_disabled() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}],
            "model": "gpt-4o-mini"
        });

        // The mock matches any POST; we assert on the parsed response.
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let params = GenerationParams {
            json_mode: false,
            ..GenerationParams::default()
        };
        let resp = provider_for(&server)
            .complete("s", "u", &params)
            .await
            .expect("complete");
        assert_eq!(resp.text, "ok");
    }

    #[tokio::test]
    async fn error_429_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .append_header("retry-after", "15")
                    .set_body_json(serde_json::json!({
                        "error": {"message": "Rate limit reached"}
                    })),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete("s", "u", &GenerationParams::default())
            .await
            .unwrap_err();

        match err {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 15),
            other => panic!("expected RateLimited, got: {other}"),
        }
    }

    #[tokio::test]
    async fn error_500_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"message": "internal"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete("s", "u", &GenerationParams::default())
            .await
            .unwrap_err();

        match err {
            LlmError::Api { status, .. } => assert_eq!(status, 500),
            other => panic!("expected Api, got: {other}"),
        }
    }
}
