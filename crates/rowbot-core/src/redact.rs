//! Secret redaction and masking helpers for logs and operator diagnostics.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

const REDACTED: &str = "***REDACTED***";

fn bearer_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bBearer\s+[^\s,;]+").expect("bearer token regex must compile")
    })
}

fn secret_kv_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(api[_-]?key|x-api-key|x-key|access_token|client_secret)\s*[:=]\s*"?([^\s,&"]+)"?"#)
            .expect("secret key-value regex must compile")
    })
}

/// Redact token/secret values from a string.
///
/// Applied to every provider error body before it reaches logs or
/// user-facing diagnostics.
pub fn redact_secrets(input: &str) -> String {
    let with_bearer_redacted = bearer_token_re().replace_all(input, format!("Bearer {REDACTED}"));

    secret_kv_re()
        .replace_all(&with_bearer_redacted, |caps: &Captures<'_>| {
            format!("{}={REDACTED}", &caps[1])
        })
        .into_owned()
}

/// Mask a secret string for operator display.
pub fn mask_secret(secret: &str) -> String {
    let char_count = secret.chars().count();

    if char_count > 8 {
        let prefix: String = secret.chars().take(4).collect();
        let suffix: String = secret
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{prefix}...{suffix}")
    } else if !secret.is_empty() {
        "****".to_string()
    } else {
        "(empty)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_bearer_token() {
        let input = "Authorization: Bearer sk-abc123def456";
        let out = redact_secrets(input);
        assert!(!out.contains("sk-abc123def456"));
        assert!(out.contains("***REDACTED***"));
    }

    #[test]
    fn redact_api_key_kv() {
        let input = r#"{"error": "bad request", "api_key": "sp-secret-key"}"#;
        let out = redact_secrets(input);
        assert!(!out.contains("sp-secret-key"));
        assert!(out.contains("api_key=***REDACTED***"));
    }

    #[test]
    fn redact_x_api_key_header() {
        let input = "X-API-KEY: serper-key-value failed";
        let out = redact_secrets(input);
        assert!(!out.contains("serper-key-value"));
    }

    #[test]
    fn redact_leaves_plain_text_alone() {
        let input = "company not found for query";
        assert_eq!(redact_secrets(input), input);
    }

    #[test]
    fn mask_long_secret() {
        assert_eq!(mask_secret("abcdefghijkl"), "abcd...ijkl");
    }

    #[test]
    fn mask_short_secret() {
        assert_eq!(mask_secret("abc"), "****");
    }

    #[test]
    fn mask_empty_secret() {
        assert_eq!(mask_secret(""), "(empty)");
    }
}
