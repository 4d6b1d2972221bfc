//! Enrichment tools: the per-field resolution and decoration algorithms.
//!
//! Every tool implements the same contract: given the normalized input and
//! the outputs accumulated so far, produce an output map of canonical field
//! names. Keys prefixed with `_` are metadata (confidence, source, reason)
//! the executor propagates but does not treat as row fields. Tools reach
//! providers only through [`crate::service::Services`], so every external
//! call passes the reliability stack.

pub mod company_domain;
pub mod company_name;
pub mod company_profile;
pub mod company_size;
pub mod company_socials;
pub mod linkedin_finder;
pub mod person_from_name;
pub mod person_profile;
pub mod person_resolve;
pub mod work_email;

use serde_json::Value;

use crate::error::ToolError;
use crate::fields::{self, NormalizedInput, OutputMap};
use crate::service::Services;

/// The common tool contract.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool. `acc` holds prior steps' outputs; tools read their
    /// inputs from the row first and fall back to `acc`.
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError>;
}

/// Confidence buckets consumed downstream instead of raw floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ConfidenceLevel {
    /// ≥ 0.85.
    High,
    /// ≥ 0.65.
    Medium,
    /// ≥ 0.40.
    Low,
    /// < 0.40.
    Fail,
}

impl ConfidenceLevel {
    /// Bucket a raw confidence score.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            ConfidenceLevel::High
        } else if score >= 0.65 {
            ConfidenceLevel::Medium
        } else if score >= 0.40 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Fail
        }
    }

    /// Lowercase label used in output maps.
    pub fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Fail => "fail",
        }
    }
}

/// Read a canonical input field from the row, falling back to accumulated
/// step outputs.
pub fn lookup_field(input: &NormalizedInput, acc: &OutputMap, field: &str) -> Option<String> {
    let from_input = match field {
        fields::NAME => input.name.clone(),
        fields::COMPANY => input.company.clone(),
        fields::DOMAIN => input.domain.clone(),
        fields::EMAIL => input.email.clone(),
        fields::LINKEDIN_URL => input.linkedin_url.clone(),
        _ => None,
    };
    from_input.or_else(|| {
        acc.get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Insert a string output when present and non-empty; null otherwise.
pub fn put_opt(map: &mut OutputMap, key: &str, value: Option<String>) {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => map.insert(key.to_string(), Value::String(v)),
        None => map.insert(key.to_string(), Value::Null),
    };
}

/// Insert the standard confidence metadata pair.
pub fn put_confidence(map: &mut OutputMap, confidence: f64) {
    let clamped = confidence.clamp(0.0, 0.95);
    map.insert(
        "_confidence".to_string(),
        serde_json::json!((clamped * 1000.0).round() / 1000.0),
    );
}

/// Missing-input error helper.
pub fn missing_input(tool: &str, field: &str) -> ToolError {
    ToolError::MissingInput {
        tool: tool.to_string(),
        field: field.to_string(),
    }
}

/// Provider-failure error helper.
pub fn provider_failure(tool: &str, source: crate::error::ProviderError) -> ToolError {
    ToolError::Provider {
        tool: tool.to_string(),
        source,
    }
}

/// Placeholder executor for registry entries that advertise outputs whose
/// implementation does not exist yet. Planning may reason about them;
/// executing one is a hard error.
pub struct UnimplementedTool {
    /// The advertised tool id.
    pub id: &'static str,
}

#[async_trait::async_trait]
impl Tool for UnimplementedTool {
    async fn execute(
        &self,
        _services: &Services,
        _input: &NormalizedInput,
        _acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        Err(ToolError::NotImplemented {
            tool: self.id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn confidence_buckets() {
        assert_eq!(ConfidenceLevel::from_score(0.9), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.85), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.39), ConfidenceLevel::Fail);
    }

    #[test]
    fn lookup_prefers_row_over_acc() {
        let input = NormalizedInput {
            row_id: "r".to_string(),
            domain: Some("stripe.com".to_string()),
            ..Default::default()
        };
        let mut acc = OutputMap::new();
        acc.insert(fields::DOMAIN.to_string(), json!("other.com"));
        assert_eq!(
            lookup_field(&input, &acc, fields::DOMAIN).as_deref(),
            Some("stripe.com")
        );
    }

    #[test]
    fn lookup_falls_back_to_acc() {
        let input = NormalizedInput::default();
        let mut acc = OutputMap::new();
        acc.insert(fields::DOMAIN.to_string(), json!("linear.app"));
        assert_eq!(
            lookup_field(&input, &acc, fields::DOMAIN).as_deref(),
            Some("linear.app")
        );
    }

    #[test]
    fn put_confidence_clamps_to_cap() {
        let mut map = OutputMap::new();
        put_confidence(&mut map, 1.7);
        assert_eq!(map["_confidence"], json!(0.95));
    }
}
