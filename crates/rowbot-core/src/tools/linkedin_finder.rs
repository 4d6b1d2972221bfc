//! LinkedIn profile finder: the person identity anchor.
//!
//! Searches for `name + company` profiles, then hands up to five candidate
//! URLs to a schema-bound LLM whose only job is to pick one or refuse.
//! URLs are never fabricated: the selection must be one of the candidates.

use serde_json::{json, Value};

use super::{lookup_field, provider_failure, put_confidence, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, extract_linkedin_person_slug, NormalizedInput, OutputMap};
use crate::providers::OrganicResult;
use crate::service::Services;

const TOOL_ID: &str = "find_linkedin_profile";

/// Candidates offered to the selector.
const MAX_CANDIDATES: usize = 5;

/// Below this blended confidence the tool refuses.
const ACCEPT_THRESHOLD: f64 = 0.50;

const SELECTION_TEMPERATURE: f32 = 0.1;

fn selection_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "selectedUrl": {"type": ["string", "null"]},
            "nameMatch": {"type": "boolean"},
            "companyMatch": {"type": "boolean"},
            "titlePresent": {"type": "boolean"},
            "confidence": {"type": "number"},
            "reason": {"type": ["string", "null"]}
        }
    })
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct Selection {
    #[serde(rename = "selectedUrl")]
    selected_url: Option<String>,
    #[serde(rename = "nameMatch", default)]
    name_match: bool,
    #[serde(rename = "companyMatch", default)]
    company_match: bool,
    #[serde(rename = "titlePresent", default)]
    title_present: bool,
    #[serde(default)]
    confidence: f64,
    reason: Option<String>,
}

/// The LinkedIn profile finder tool.
pub struct LinkedinProfileFinder;

impl LinkedinProfileFinder {
    /// Core lookup shared with the person orchestrator: returns
    /// `(url, confidence, candidates_found, reason)`.
    pub async fn find(
        services: &Services,
        name: &str,
        company: &str,
    ) -> Result<(Option<String>, f64, usize, Option<String>), ToolError> {
        // Primary query, then a broader retry.
        let mut candidates = profile_hits(
            &services
                .search(&format!("\"{name}\" \"{company}\" site:linkedin.com/in"))
                .await
                .map_err(|e| provider_failure(TOOL_ID, e))?
                .organic,
        );
        if candidates.is_empty() {
            candidates = profile_hits(
                &services
                    .search(&format!("\"{name}\" \"{company}\" LinkedIn"))
                    .await
                    .map_err(|e| provider_failure(TOOL_ID, e))?
                    .organic,
            );
        }
        if candidates.is_empty() {
            return Ok((None, 0.0, 0, Some("no LinkedIn profile hits".to_string())));
        }
        candidates.truncate(MAX_CANDIDATES);

        let listing = candidates
            .iter()
            .map(|c| format!("{}. {} — {}\n   {}", c.position, c.title, c.link, c.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        let system = "You select the LinkedIn profile belonging to a specific person, \
                      or refuse. Pick selectedUrl ONLY from the listed candidates. If no \
                      candidate clearly matches both the person and the company, return \
                      null. Never guess.";
        let user = format!(
            "Person: {name}\nCompany: {company}\n\nCandidates:\n{listing}"
        );

        let selection = match services
            .extract(system, &user, &selection_schema(), SELECTION_TEMPERATURE)
            .await
        {
            Ok(Some(value)) => serde_json::from_value::<Selection>(value).unwrap_or_default(),
            Ok(None) => Selection::default(),
            Err(e) => {
                tracing::debug!(error = %e, "profile selection failed");
                Selection::default()
            }
        };

        // Reject fabricated URLs.
        let selected = selection.selected_url.filter(|url| {
            candidates.iter().any(|c| c.link == *url)
                || candidates
                    .iter()
                    .any(|c| extract_linkedin_person_slug(&c.link) == extract_linkedin_person_slug(url))
        });

        let Some(url) = selected else {
            return Ok((
                None,
                0.0,
                candidates.len(),
                selection.reason.or_else(|| Some("selector refused".to_string())),
            ));
        };

        let position_bonus = candidates
            .first()
            .map(|c| c.link == url)
            .unwrap_or(false);
        let local: f64 = [
            (selection.name_match, 0.4),
            (selection.company_match, 0.3),
            (selection.title_present, 0.2),
            (position_bonus, 0.1),
        ]
        .iter()
        .filter(|(matched, _)| *matched)
        .map(|(_, weight)| weight)
        .sum();
        let blended = (0.6 * local + 0.4 * selection.confidence.clamp(0.0, 1.0)).min(0.95);

        if blended < ACCEPT_THRESHOLD {
            return Ok((
                None,
                blended,
                candidates.len(),
                selection
                    .reason
                    .or_else(|| Some("below acceptance threshold".to_string())),
            ));
        }

        Ok((Some(url), blended, candidates.len(), selection.reason))
    }
}

#[async_trait::async_trait]
impl Tool for LinkedinProfileFinder {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let name = lookup_field(input, acc, fields::NAME)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::NAME))?;
        let company = lookup_field(input, acc, fields::COMPANY)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::COMPANY))?;

        let (url, confidence, candidates_found, reason) =
            Self::find(services, &name, &company).await?;

        tracing::debug!(
            name = %name,
            company = %company,
            found = url.is_some(),
            confidence,
            candidates_found,
            "linkedin profile lookup",
        );

        let mut out = OutputMap::new();
        put_opt(&mut out, fields::LINKEDIN_URL, url);
        put_confidence(&mut out, confidence);
        out.insert("_candidatesFound".to_string(), json!(candidates_found));
        if let Some(reason) = reason {
            out.insert("_matchReason".to_string(), json!(reason));
        }
        out.insert("_source".to_string(), json!(TOOL_ID));
        Ok(out)
    }
}

/// Keep only hits that are real person-profile URLs.
fn profile_hits(organic: &[OrganicResult]) -> Vec<OrganicResult> {
    organic
        .iter()
        .filter(|r| extract_linkedin_person_slug(&r.link).is_some())
        .cloned()
        .collect()
}
