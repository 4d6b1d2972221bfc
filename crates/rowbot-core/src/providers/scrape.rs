//! Bounded HTML page fetcher.
//!
//! Follows redirects, identifies itself with a polite user agent, and caps
//! the body size before any parsing happens. Non-2xx responses are "no
//! page", not errors.

use std::time::Duration;

use super::PageFetcher;
use crate::error::ProviderError;

/// Maximum HTML body size retained, in bytes.
const MAX_BODY_BYTES: usize = 512 * 1024;

/// User agent sent with every fetch.
const USER_AGENT: &str = "rowbot/0.1 (+https://github.com/rowbot-hq/rowbot)";

/// Reqwest-based page fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Build a fetcher with redirect following and the polite user agent.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Option<String>, ProviderError> {
        tracing::debug!(url = %url, "page fetch");

        let response = self.client.get(url).timeout(timeout).send().await?;

        if !response.status().is_success() {
            tracing::debug!(url = %url, status = response.status().as_u16(), "no usable page");
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(truncate_to_char_boundary(body, MAX_BODY_BYTES)))
    }
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 character.
fn truncate_to_char_boundary(mut s: String, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s;
    }
    let mut cut = max_bytes;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><title>Acme</title></html>"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let html = fetcher
            .fetch(&server.uri(), Duration::from_secs(2))
            .await
            .expect("fetch")
            .expect("body");
        assert!(html.contains("Acme"));
    }

    #[tokio::test]
    async fn non_success_is_no_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let html = fetcher
            .fetch(&server.uri(), Duration::from_secs(2))
            .await
            .expect("fetch");
        assert!(html.is_none());
    }

    #[tokio::test]
    async fn empty_body_is_no_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let html = fetcher
            .fetch(&server.uri(), Duration::from_secs(2))
            .await
            .expect("fetch");
        assert!(html.is_none());
    }

    #[tokio::test]
    async fn oversized_body_is_capped() {
        let server = MockServer::start().await;
        let big = "x".repeat(MAX_BODY_BYTES + 4096);
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(big))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new();
        let html = fetcher
            .fetch(&server.uri(), Duration::from_secs(2))
            .await
            .expect("fetch")
            .expect("body");
        assert_eq!(html.len(), MAX_BODY_BYTES);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "aé".repeat(10);
        let out = truncate_to_char_boundary(s, 3);
        // "aé" is 3 bytes; cutting at 3 keeps a whole pair.
        assert_eq!(out, "aé");
    }
}
