//! Company profile: description, industry, founding year, location.
//!
//! Three-tier waterfall, each tier skipped when the previous one met its
//! confidence floor: homepage metadata (≥ 0.75), search-assisted evidence
//! (≥ 0.60), then a deep scrape of the page's about-like region (accepted
//! as-is). Every tier feeds the same schema-constrained extractor.

use serde_json::{json, Value};

use super::{lookup_field, provider_failure, put_confidence, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, NormalizedInput, OutputMap};
use crate::providers::html;
use crate::service::Services;

const TOOL_ID: &str = "fetch_company_profile";

const TIER1_FLOOR: f64 = 0.75;
const TIER2_FLOOR: f64 = 0.60;

/// Evidence cap for the deep-scrape tier.
const SCRAPE_EVIDENCE_CHARS: usize = 2000;

const EXTRACTION_TEMPERATURE: f32 = 0.1;

fn profile_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "description": {"type": ["string", "null"]},
            "industry": {"type": ["string", "null"]},
            "founded": {"type": ["string", "null"]},
            "location": {"type": ["string", "null"]},
            "confidence": {"type": "number"}
        }
    })
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileExtraction {
    description: Option<String>,
    industry: Option<String>,
    #[serde(deserialize_with = "de_founded", default)]
    founded: Option<String>,
    location: Option<String>,
    #[serde(default)]
    confidence: f64,
}

/// Models sometimes return the founding year as a number.
fn de_founded<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// The company profile tool.
pub struct CompanyProfileFetcher;

#[async_trait::async_trait]
impl Tool for CompanyProfileFetcher {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let domain = lookup_field(input, acc, fields::DOMAIN)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::DOMAIN))?;
        let company = lookup_field(input, acc, fields::COMPANY);
        let subject = company.as_deref().unwrap_or(&domain);

        let homepage = services
            .fetch_page(&format!("https://{domain}"))
            .await
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "homepage fetch failed, tiers 1/3 degraded");
                None
            });

        // Tier 1: homepage metadata only.
        if let Some(body) = &homepage {
            let title = html::page_title(body);
            let description = html::meta_description(body);
            if title.is_some() || description.is_some() {
                let evidence = format!(
                    "Homepage title: {}\nMeta description: {}",
                    title.as_deref().unwrap_or("(none)"),
                    description.as_deref().unwrap_or("(none)"),
                );
                if let Some(extraction) = self.run_tier(services, subject, &evidence).await? {
                    if extraction.confidence >= TIER1_FLOOR {
                        return Ok(to_output(extraction, 1));
                    }
                }
            }
        }

        // Tier 2: search-assisted.
        match services.search(subject).await {
            Ok(response) => {
                let mut evidence = Vec::new();
                if let Some(kg) = &response.knowledge_graph {
                    if let Some(description) = &kg.description {
                        evidence.push(description.clone());
                    }
                    for (key, value) in &kg.attributes {
                        evidence.push(format!("{key}: {value}"));
                    }
                }
                for result in response.organic.iter().take(3) {
                    evidence.push(format!("{} — {}", result.title, result.snippet));
                }
                if !evidence.is_empty() {
                    let evidence = evidence.join("\n");
                    if let Some(extraction) = self.run_tier(services, subject, &evidence).await? {
                        if extraction.confidence >= TIER2_FLOOR {
                            return Ok(to_output(extraction, 2));
                        }
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "tier 2 search failed");
            }
        }

        // Tier 3: deep scrape of the about-like region.
        if let Some(body) = &homepage {
            if let Some(about) = html::about_text(body, SCRAPE_EVIDENCE_CHARS) {
                if let Some(extraction) = self.run_tier(services, subject, &about).await? {
                    return Ok(to_output(extraction, 3));
                }
            }
        }

        Ok(empty_output())
    }
}

impl CompanyProfileFetcher {
    async fn run_tier(
        &self,
        services: &Services,
        subject: &str,
        evidence: &str,
    ) -> Result<Option<ProfileExtraction>, ToolError> {
        let system = "You extract company facts from evidence about a company's website \
                      and search presence. Use only what the evidence states.";
        let user = format!("Company: {subject}\n\nEvidence:\n{evidence}");

        match services
            .extract(system, &user, &profile_schema(), EXTRACTION_TEMPERATURE)
            .await
        {
            Ok(Some(value)) => match serde_json::from_value::<ProfileExtraction>(value) {
                Ok(extraction) => Ok(Some(extraction)),
                Err(e) => {
                    tracing::debug!(error = %e, "profile extraction shape rejected");
                    Ok(None)
                }
            },
            Ok(None) => Ok(None),
            Err(e @ crate::error::ProviderError::NotConfigured { .. }) => {
                Err(provider_failure(TOOL_ID, e))
            }
            Err(e) => {
                tracing::debug!(error = %e, "profile extraction failed");
                Ok(None)
            }
        }
    }
}

fn to_output(extraction: ProfileExtraction, tier: u8) -> OutputMap {
    let mut out = OutputMap::new();
    put_opt(&mut out, fields::DESCRIPTION, extraction.description);
    put_opt(&mut out, fields::INDUSTRY, extraction.industry);
    put_opt(&mut out, fields::FOUNDED, extraction.founded);
    put_opt(&mut out, fields::LOCATION, extraction.location);
    put_confidence(&mut out, extraction.confidence);
    out.insert("_tier".to_string(), json!(tier));
    out.insert("_source".to_string(), json!(TOOL_ID));
    out
}

fn empty_output() -> OutputMap {
    let mut out = OutputMap::new();
    put_opt(&mut out, fields::DESCRIPTION, None);
    put_opt(&mut out, fields::INDUSTRY, None);
    put_opt(&mut out, fields::FOUNDED, None);
    put_opt(&mut out, fields::LOCATION, None);
    put_confidence(&mut out, 0.0);
    out.insert("_source".to_string(), json!(TOOL_ID));
    out
}
