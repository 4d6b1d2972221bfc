//! Prospeo email-finder adapter.
//!
//! Two lookup shapes: LinkedIn-URL-anchored and name+domain. Provider
//! confidence (0-100) is normalized to [0, 1] before leaving the adapter.
//! The adapter never constructs emails itself.

use std::time::Duration;

use serde::Deserialize;

use super::{EmailFinder, EmailFinderResult};
use crate::error::ProviderError;
use crate::redact::redact_secrets;

/// Default Prospeo API endpoint.
const PROSPEO_BASE_URL: &str = "https://api.prospeo.io";

/// Request timeout for email-finder calls.
const PROSPEO_TIMEOUT: Duration = Duration::from_secs(15);

/// Email-finder adapter backed by prospeo.io.
pub struct ProspeoClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ProspeoClient {
    /// Create a client with the default base URL.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, PROSPEO_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn call(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<EmailFinderResult, ProviderError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .header("X-KEY", &self.api_key)
            .header("content-type", "application/json")
            .timeout(PROSPEO_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: redact_secrets(&body),
            });
        }

        let parsed: ProspeoEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(format!("prospeo response: {e}")))?;

        if parsed.error {
            // "Not found" is a successful provider answer, not a failure.
            return Ok(EmailFinderResult {
                success: false,
                error: parsed.message,
                ..EmailFinderResult::default()
            });
        }

        let Some(data) = parsed.response else {
            return Ok(EmailFinderResult {
                success: false,
                error: Some("empty response body".to_string()),
                ..EmailFinderResult::default()
            });
        };

        let email = data.email.filter(|e| !e.is_empty());
        Ok(EmailFinderResult {
            success: email.is_some(),
            email,
            confidence: f64::from(data.confidence.unwrap_or(0)).clamp(0.0, 100.0) / 100.0,
            email_status: data.email_status,
            linkedin_url: data.linkedin_url,
            person_name: data.full_name,
            current_company: data.company,
            current_job_title: data.job_title,
            error: None,
        })
    }
}

#[async_trait::async_trait]
impl EmailFinder for ProspeoClient {
    async fn by_linkedin(&self, linkedin_url: &str) -> Result<EmailFinderResult, ProviderError> {
        tracing::debug!(url = %linkedin_url, "email lookup by linkedin");
        self.call(
            "linkedin-email-finder",
            serde_json::json!({ "url": linkedin_url }),
        )
        .await
    }

    async fn by_name_company(
        &self,
        full_name: &str,
        domain: &str,
    ) -> Result<EmailFinderResult, ProviderError> {
        tracing::debug!(name = %full_name, domain = %domain, "email lookup by name+domain");
        self.call(
            "email-finder",
            serde_json::json!({ "full_name": full_name, "company": domain }),
        )
        .await
    }
}

// --- Internal Serde types ---

#[derive(Deserialize)]
struct ProspeoEnvelope {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<ProspeoResponse>,
}

#[derive(Deserialize)]
struct ProspeoResponse {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    confidence: Option<u32>,
    #[serde(default)]
    email_status: Option<String>,
    #[serde(default)]
    linkedin_url: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    job_title: Option<String>,
}
