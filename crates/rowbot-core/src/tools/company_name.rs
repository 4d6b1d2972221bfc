//! Company identity from a name string.
//!
//! Answers exactly one question: given this name, which real-world company
//! does it most likely refer to? One high-specificity search, deterministic
//! per-candidate scoring, explicit penalties. The LLM is never consulted to
//! choose a name.

use serde_json::json;

use super::{lookup_field, provider_failure, put_confidence, put_opt, ConfidenceLevel, Tool};
use crate::error::ToolError;
use crate::fields::{self, normalize_domain, NormalizedInput, OutputMap};
use crate::service::Services;

const TOOL_ID: &str = "resolve_company_from_name";

/// Directory, social, and aggregator hosts that can never be a company's
/// own website.
const REJECTED_DOMAINS: &[&str] = &[
    "linkedin.com",
    "crunchbase.com",
    "bloomberg.com",
    "forbes.com",
    "wikipedia.org",
    "yelp.com",
    "glassdoor.com",
    "indeed.com",
    "zoominfo.com",
    "apollo.io",
    "g2.com",
    "capterra.com",
    "facebook.com",
    "x.com",
    "twitter.com",
    "instagram.com",
    "youtube.com",
];

/// Words that mark a name as too generic to resolve confidently.
const GENERIC_NAME_TOKENS: &[&str] = &[
    "global",
    "solutions",
    "technologies",
    "services",
    "consulting",
    "partners",
    "group",
    "international",
    "digital",
    "systems",
    "software",
    "tech",
];

/// Legal suffixes stripped during normalization.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "llc",
    "ltd",
    "corp",
    "corporation",
    "co",
    "pvt",
];

/// A raw search hit under consideration, with its score breakdown.
#[derive(Debug, Clone)]
struct CandidateCompany {
    domain: String,
    url: String,
    title: String,
    snippet: String,
    position: u32,
    score: f64,
    penalties: Vec<String>,
}

/// The name → company resolver tool.
pub struct CompanyNameResolver;

#[async_trait::async_trait]
impl Tool for CompanyNameResolver {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let raw_name = lookup_field(input, acc, fields::COMPANY)
            .or_else(|| lookup_field(input, acc, fields::NAME))
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::COMPANY))?;

        let normalized = normalize_company_name(&raw_name);
        if normalized.is_empty() {
            return Ok(fail_output("Company name is empty after normalization"));
        }

        // The single canonical high-specificity query.
        let query = format!("{raw_name} official website - landing page");
        let response = services
            .search(&query)
            .await
            .map_err(|e| provider_failure(TOOL_ID, e))?;

        let mut candidates = extract_candidates(&response.organic);
        if candidates.is_empty() {
            return Ok(fail_output("No usable website candidates in search results"));
        }

        let candidate_count = candidates.len();
        for candidate in &mut candidates {
            score_candidate(candidate, &normalized, candidate_count);
        }
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Multiple-strong-candidates penalty lands on the top only.
        if candidates.len() > 1 && (candidates[0].score - candidates[1].score) < 0.10 {
            candidates[0].score -= 0.20;
            candidates[0]
                .penalties
                .push("Multiple strong candidates (-0.20)".to_string());
        }

        let winner = &candidates[0];
        let cap = if !winner.penalties.is_empty() || candidate_count > 1 {
            0.90
        } else {
            0.95
        };
        let confidence = winner.score.clamp(0.0, 1.0).min(cap);
        let level = ConfidenceLevel::from_score(confidence);

        tracing::debug!(
            name = %raw_name,
            winner = %winner.domain,
            confidence,
            level = level.label(),
            candidates = candidate_count,
            "company name resolved",
        );

        if level == ConfidenceLevel::Fail {
            return Ok(fail_output(&low_confidence_reason(winner, confidence)));
        }

        let canonical = canonical_name_from_title(&winner.title)
            .unwrap_or_else(|| raw_name.trim().to_string());

        let mut out = OutputMap::new();
        put_opt(&mut out, fields::CANONICAL_COMPANY_NAME, Some(canonical));
        put_opt(&mut out, fields::DOMAIN, Some(winner.domain.clone()));
        put_opt(&mut out, fields::WEBSITE, Some(winner.url.clone()));
        put_confidence(&mut out, confidence);
        out.insert("_confidenceLevel".to_string(), json!(level.label()));
        out.insert("_source".to_string(), json!(TOOL_ID));
        if level == ConfidenceLevel::Low {
            out.insert(
                "_reason".to_string(),
                json!(low_confidence_reason(winner, confidence)),
            );
        }
        Ok(out)
    }
}

/// Generic web search step for company rows: collects snippet context for
/// later extraction steps and serves as the resolver's fallback.
pub struct CompanyWebSearch;

#[async_trait::async_trait]
impl Tool for CompanyWebSearch {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let company = lookup_field(input, acc, fields::COMPANY)
            .or_else(|| lookup_field(input, acc, fields::NAME))
            .ok_or_else(|| super::missing_input("search_company_web", fields::COMPANY))?;

        let response = services
            .search(&company)
            .await
            .map_err(|e| provider_failure("search_company_web", e))?;

        let mut context: Vec<String> = response
            .organic
            .iter()
            .take(5)
            .map(|r| format!("{} — {}", r.title, r.snippet))
            .collect();
        if let Some(kg) = &response.knowledge_graph {
            if let Some(description) = &kg.description {
                context.insert(0, description.clone());
            }
        }

        let mut out = OutputMap::new();
        if context.is_empty() {
            out.insert(fields::SEARCH_CONTEXT.to_string(), serde_json::Value::Null);
        } else {
            out.insert(fields::SEARCH_CONTEXT.to_string(), json!(context.join("\n")));
        }
        out.insert("_source".to_string(), json!("search_company_web"));
        Ok(out)
    }
}

/// Lowercase, strip legal suffixes and punctuation, collapse whitespace.
pub fn normalize_company_name(name: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    let tokens: Vec<&str> = lowered
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .filter(|t| !LEGAL_SUFFIXES.contains(t))
        .collect();
    tokens.join(" ")
}

fn extract_candidates(organic: &[crate::providers::OrganicResult]) -> Vec<CandidateCompany> {
    let mut seen = std::collections::BTreeSet::new();
    let mut candidates = Vec::new();

    for result in organic.iter().take(10) {
        let Some(domain) = normalize_domain(&result.link) else {
            continue;
        };
        if REJECTED_DOMAINS
            .iter()
            .any(|rejected| domain == *rejected || domain.ends_with(&format!(".{rejected}")))
        {
            continue;
        }
        if !seen.insert(domain.clone()) {
            continue;
        }
        candidates.push(CandidateCompany {
            domain,
            url: result.link.clone(),
            title: result.title.clone(),
            snippet: result.snippet.clone(),
            position: result.position,
            score: 0.0,
            penalties: Vec::new(),
        });
    }
    candidates
}

fn score_candidate(candidate: &mut CandidateCompany, normalized_name: &str, candidate_count: usize) {
    let mut score = 0.0;

    // Official website match, up to +0.40.
    let title_norm = normalize_company_name(&candidate.title);
    let snippet_norm = candidate.snippet.to_ascii_lowercase();
    let in_title = title_norm.contains(normalized_name);
    let in_snippet = snippet_norm.contains(normalized_name);
    if in_title {
        score += 0.25;
        if in_snippet {
            score += 0.15;
        }
    } else if in_snippet {
        score += 0.15;
    }

    // Search intent alignment: the canonical query always carries
    // "official website", worth +0.25 to every surviving candidate.
    score += 0.25;

    // Domain quality, up to +0.15.
    if candidate.url.starts_with("https://") {
        score += 0.05;
    }
    if candidate.position <= 3 {
        score += 0.10;
    } else if candidate.position <= 5 {
        score += 0.05;
    }

    // External corroboration (weak signal), +0.10.
    if ["linkedin", "github", "product hunt"]
        .iter()
        .any(|s| snippet_norm.contains(s))
    {
        score += 0.10;
    }

    // Name uniqueness, +0.10.
    let multi_word = normalized_name.contains(' ');
    let distinctive_single = normalized_name.len() >= 4 && candidate_count <= 3;
    if multi_word || distinctive_single {
        score += 0.10;
    }

    // Penalties.
    if GENERIC_NAME_TOKENS
        .iter()
        .any(|token| normalized_name.split(' ').any(|word| word == *token))
    {
        score -= 0.15;
        candidate
            .penalties
            .push("Generic company name (-0.15)".to_string());
    }
    let snippet_lower = candidate.snippet.to_ascii_lowercase();
    if snippet_lower.contains("for sale")
        || snippet_lower.contains("parked")
        || snippet_lower.contains("coming soon")
        || candidate.snippet.len() < 50
    {
        score -= 0.10;
        candidate
            .penalties
            .push("Weak homepage signals (-0.10)".to_string());
    }

    candidate.score = score;
}

/// Strip a trailing tagline and legal suffixes from a result title.
fn canonical_name_from_title(title: &str) -> Option<String> {
    let head = ["—", "–", "|", " - ", ":"]
        .iter()
        .fold(title.to_string(), |acc, sep| {
            acc.split(sep).next().unwrap_or(&acc).to_string()
        });
    let cleaned: Vec<&str> = head
        .split_whitespace()
        .filter(|t| {
            !LEGAL_SUFFIXES.contains(
                &t.trim_matches(|c: char| !c.is_ascii_alphanumeric())
                    .to_ascii_lowercase()
                    .as_str(),
            )
        })
        .collect();
    let name = cleaned.join(" ").trim().to_string();
    if name.len() < 2 || name.len() > 80 {
        None
    } else {
        Some(name)
    }
}

fn low_confidence_reason(winner: &CandidateCompany, confidence: f64) -> String {
    if winner.penalties.is_empty() {
        format!(
            "Low-signal candidates only (best {:.2} for {})",
            confidence, winner.domain
        )
    } else {
        format!(
            "{} (best {:.2} for {})",
            winner.penalties.join("; "),
            confidence,
            winner.domain
        )
    }
}

fn fail_output(reason: &str) -> OutputMap {
    let mut out = OutputMap::new();
    put_opt(&mut out, fields::CANONICAL_COMPANY_NAME, None);
    put_opt(&mut out, fields::DOMAIN, None);
    put_opt(&mut out, fields::WEBSITE, None);
    put_confidence(&mut out, 0.0);
    out.insert("_confidenceLevel".to_string(), json!("fail"));
    out.insert("_reason".to_string(), json!(reason));
    out.insert("_source".to_string(), json!(TOOL_ID));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{fake_services, hit, organic, FakeSearch};
    use std::sync::Arc;

    fn company_input(name: &str) -> NormalizedInput {
        NormalizedInput {
            row_id: "r1".to_string(),
            company: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn normalization_strips_suffixes_and_punctuation() {
        assert_eq!(normalize_company_name("Stripe, Inc."), "stripe");
        assert_eq!(normalize_company_name("Acme Pvt Ltd"), "acme");
        assert_eq!(normalize_company_name("Linear"), "linear");
        assert_eq!(normalize_company_name("Inc."), "");
    }

    #[test]
    fn canonical_name_strips_taglines() {
        assert_eq!(
            canonical_name_from_title("Stripe | Financial infrastructure").as_deref(),
            Some("Stripe")
        );
        assert_eq!(
            canonical_name_from_title("Linear — Plan and build products").as_deref(),
            Some("Linear")
        );
        assert_eq!(canonical_name_from_title("x").as_deref(), None);
    }

    #[tokio::test]
    async fn strong_single_candidate_scores_high() {
        let search = Arc::new(FakeSearch::new().on(
            "Stripe official website",
            organic(vec![
                hit(
                    1,
                    "Stripe | Financial infrastructure to grow your revenue",
                    "https://stripe.com/",
                    "Stripe powers online and in-person payment processing and financial solutions. Find Stripe on LinkedIn.",
                ),
                hit(
                    2,
                    "Stripe - Wikipedia",
                    "https://en.wikipedia.org/wiki/Stripe,_Inc.",
                    "Stripe, Inc. is an Irish-American multinational financial services company.",
                ),
            ]),
        ));
        let services = fake_services(Some(search), None, None, None).await;

        let out = CompanyNameResolver
            .execute(&services, &company_input("Stripe"), &OutputMap::new())
            .await
            .expect("execute");

        assert_eq!(out[fields::DOMAIN], serde_json::json!("stripe.com"));
        assert_eq!(
            out[fields::CANONICAL_COMPANY_NAME],
            serde_json::json!("Stripe")
        );
        let confidence = out["_confidence"].as_f64().unwrap();
        // Wikipedia is rejected as a directory, leaving one candidate:
        // full signal stack, no penalties, capped at 0.95.
        assert!(confidence >= 0.90, "got {confidence}");
        assert!(confidence <= 0.95);
        assert_eq!(out["_confidenceLevel"], serde_json::json!("high"));
    }

    #[tokio::test]
    async fn close_competitors_cap_at_medium() {
        let search = Arc::new(FakeSearch::new().on(
            "Linear official website",
            organic(vec![
                hit(
                    1,
                    "Linear — Plan and build products",
                    "https://linear.app/",
                    "Linear streamlines issues, projects, and roadmaps for modern product teams everywhere.",
                ),
                hit(
                    2,
                    "Linear | Professional Tools",
                    "https://linear-tools.com/",
                    "Linear professional tools for construction and measurement, trusted by contractors.",
                ),
                hit(
                    3,
                    "Linear Motion Systems",
                    "https://linearmotion.io/",
                    "Linear motion systems and actuators for industrial automation equipment suppliers.",
                ),
                hit(
                    4,
                    "Linear algebra course",
                    "https://mathsite.edu/linear",
                    "An introduction to linear algebra.",
                ),
            ]),
        ));
        let services = fake_services(Some(search), None, None, None).await;

        let out = CompanyNameResolver
            .execute(&services, &company_input("Linear"), &OutputMap::new())
            .await
            .expect("execute");

        assert_eq!(out[fields::DOMAIN], serde_json::json!("linear.app"));
        let confidence = out["_confidence"].as_f64().unwrap();
        assert!(confidence >= 0.40 && confidence <= 0.90, "got {confidence}");
        // Two candidates within 0.10 of each other: neither may exceed 0.90.
        assert!(confidence <= 0.90);
    }

    #[tokio::test]
    async fn generic_name_fails_with_reason() {
        let search = Arc::new(FakeSearch::new().on(
            "ABC Technologies official website",
            organic(vec![
                hit(1, "ABC Tech Solutions", "https://abctechsolutions.example.com/", "IT services."),
                hit(2, "ABC Tech Services", "https://abctech.example.org/", "Tech services co."),
                hit(3, "ABC Global", "https://abcglobal.example.net/", "Global group."),
            ]),
        ));
        let services = fake_services(Some(search), None, None, None).await;

        let out = CompanyNameResolver
            .execute(
                &services,
                &company_input("ABC Technologies"),
                &OutputMap::new(),
            )
            .await
            .expect("execute");

        assert_eq!(out[fields::DOMAIN], serde_json::Value::Null);
        assert_eq!(out["_confidenceLevel"], serde_json::json!("fail"));
        let reason = out["_reason"].as_str().unwrap();
        assert!(reason.contains("Generic company name"), "reason: {reason}");
    }

    #[tokio::test]
    async fn directory_hosts_are_rejected() {
        let search = Arc::new(FakeSearch::new().on(
            "official website",
            organic(vec![
                hit(1, "Acme on LinkedIn", "https://www.linkedin.com/company/acme", "Acme profile"),
                hit(2, "Acme | Crunchbase", "https://www.crunchbase.com/organization/acme", "Acme funding"),
            ]),
        ));
        let services = fake_services(Some(search), None, None, None).await;

        let out = CompanyNameResolver
            .execute(&services, &company_input("Acme"), &OutputMap::new())
            .await
            .expect("execute");

        assert_eq!(out[fields::DOMAIN], serde_json::Value::Null);
        assert!(out["_reason"]
            .as_str()
            .unwrap()
            .contains("No usable website candidates"));
    }

    #[tokio::test]
    async fn empty_normalized_name_fails_without_searching() {
        let search = Arc::new(FakeSearch::new());
        let services = fake_services(Some(Arc::clone(&search)), None, None, None).await;

        let out = CompanyNameResolver
            .execute(&services, &company_input("Inc."), &OutputMap::new())
            .await
            .expect("execute");

        assert_eq!(out[fields::DOMAIN], serde_json::Value::Null);
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn web_search_tool_collects_context() {
        let search = Arc::new(FakeSearch::new().on(
            "Stripe",
            organic(vec![hit(1, "Stripe", "https://stripe.com", "Payments.")]),
        ));
        let services = fake_services(Some(search), None, None, None).await;

        let out = CompanyWebSearch
            .execute(&services, &company_input("Stripe"), &OutputMap::new())
            .await
            .expect("execute");
        assert!(out[fields::SEARCH_CONTEXT]
            .as_str()
            .unwrap()
            .contains("Payments"));
    }
}
