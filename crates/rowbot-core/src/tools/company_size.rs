//! Company size from LinkedIn search artefacts.
//!
//! Resolves the company's LinkedIn page URL through site-restricted
//! searches, then enriches it indirectly: more searches against the slug,
//! snippet and knowledge-graph evidence, one structured extraction.
//! LinkedIn itself is never fetched.

use serde_json::{json, Value};

use super::{lookup_field, provider_failure, put_confidence, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, extract_linkedin_company_slug, NormalizedInput, OutputMap};
use crate::providers::SearchResponse;
use crate::service::Services;

const TOOL_ID: &str = "estimate_company_size";

/// Minimum LinkedIn-URL resolution score.
const URL_SCORE_FLOOR: f64 = 0.60;

const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Slugs that are LinkedIn sections, not companies.
const RESERVED_SLUGS: &[&str] = &["school", "showcase", "jobs", "people", "about", "life"];

/// The canonical employee-count buckets.
const BUCKETS: &[&str] = &[
    "1-10", "11-50", "51-200", "201-500", "501-1000", "1001-5000", "5001-10000", "10001+",
];

fn size_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "companyName": {"type": ["string", "null"]},
            "employeeCount": {"type": ["string", "null"]},
            "industry": {"type": ["string", "null"]},
            "location": {"type": ["string", "null"]},
            "hasJobsSection": {"type": "boolean"},
            "isActivelyHiring": {"type": "boolean"},
            "confidence": {"type": "number"}
        }
    })
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SizeExtraction {
    #[serde(rename = "companyName")]
    company_name: Option<String>,
    #[serde(rename = "employeeCount")]
    employee_count: Option<String>,
    industry: Option<String>,
    location: Option<String>,
    #[serde(rename = "hasJobsSection", default)]
    has_jobs_section: bool,
    #[serde(rename = "isActivelyHiring", default)]
    is_actively_hiring: bool,
    #[serde(default)]
    confidence: f64,
}

/// The company size tool.
pub struct CompanySizeEstimator;

#[async_trait::async_trait]
impl Tool for CompanySizeEstimator {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let domain = lookup_field(input, acc, fields::DOMAIN)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::DOMAIN))?;
        let company = lookup_field(input, acc, fields::COMPANY)
            .or_else(|| lookup_field(input, acc, fields::CANONICAL_COMPANY_NAME));

        // 1. Resolve the LinkedIn company URL from search results.
        let resolution = self
            .resolve_linkedin_url(services, &domain, company.as_deref())
            .await
            .map_err(|e| provider_failure(TOOL_ID, e))?;

        let Some((linkedin_url, slug, url_score)) = resolution else {
            return Ok(unknown_output(None, 0.0, "no LinkedIn company page resolved"));
        };

        // 2. Indirect enrichment: search the slug, never fetch LinkedIn.
        let evidence = self
            .collect_evidence(services, &linkedin_url, &slug)
            .await
            .map_err(|e| provider_failure(TOOL_ID, e))?;

        if evidence.is_empty() {
            return Ok(unknown_output(
                Some(linkedin_url),
                url_score * 0.5,
                "no snippet evidence for the company page",
            ));
        }

        // 3. Structured extraction over the concatenated snippets.
        let system = "You extract company size facts from search snippets about a \
                      LinkedIn company page. Use only what the snippets state.";
        let user = format!("LinkedIn page: {linkedin_url}\n\nSnippets:\n{evidence}");
        let extraction = match services
            .extract(system, &user, &size_schema(), EXTRACTION_TEMPERATURE)
            .await
        {
            Ok(Some(value)) => serde_json::from_value::<SizeExtraction>(value).unwrap_or_default(),
            Ok(None) => SizeExtraction::default(),
            Err(e) => {
                tracing::debug!(error = %e, "size extraction failed");
                SizeExtraction::default()
            }
        };

        // 4-5. Normalize the bucket and derive hiring status.
        let bucket = extraction
            .employee_count
            .as_deref()
            .map(normalize_employee_count)
            .unwrap_or("unknown");
        let has_other_fields =
            extraction.company_name.is_some() || extraction.industry.is_some();
        let hiring = hiring_status(
            extraction.is_actively_hiring,
            extraction.has_jobs_section,
            has_other_fields || bucket != "unknown",
        );

        // 6. Mean of resolution and extraction, unknown-bucket discount.
        let mut confidence = (url_score + extraction.confidence) / 2.0;
        if bucket == "unknown" {
            confidence *= 0.7;
        }
        let confidence = confidence.min(0.95);

        let mut out = OutputMap::new();
        out.insert(fields::EMPLOYEE_COUNT_RANGE.to_string(), json!(bucket));
        out.insert(fields::HIRING_STATUS.to_string(), json!(hiring));
        put_opt(&mut out, fields::LINKEDIN_COMPANY_URL, Some(linkedin_url));
        put_opt(&mut out, fields::INDUSTRY, extraction.industry);
        put_opt(&mut out, fields::LOCATION, extraction.location);
        put_confidence(&mut out, confidence);
        out.insert("_source".to_string(), json!(TOOL_ID));
        if let Some(name) = extraction.company_name {
            out.insert("_linkedinCompanyName".to_string(), json!(name));
        }
        Ok(out)
    }
}

impl CompanySizeEstimator {
    async fn resolve_linkedin_url(
        &self,
        services: &Services,
        domain: &str,
        company: Option<&str>,
    ) -> Result<Option<(String, String, f64)>, crate::error::ProviderError> {
        let mut queries = vec![format!("site:linkedin.com/company \"{domain}\"")];
        if let Some(company) = company {
            queries.push(format!("site:linkedin.com/company \"{company}\""));
        }

        let mut best: Option<(String, String, f64)> = None;
        for query in queries {
            let response = services.search(&query).await?;
            for result in &response.organic {
                let Some(slug) = valid_company_slug(&result.link) else {
                    continue;
                };
                let score = score_candidate(result, &slug, domain, company);
                let url = format!("https://linkedin.com/company/{slug}");
                if best.as_ref().map(|(_, _, s)| score > *s).unwrap_or(true) {
                    best = Some((url, slug, score));
                }
            }
            if best.as_ref().is_some_and(|(_, _, s)| *s >= URL_SCORE_FLOOR) {
                break;
            }
        }

        Ok(best.filter(|(_, _, score)| *score >= URL_SCORE_FLOOR))
    }

    async fn collect_evidence(
        &self,
        services: &Services,
        linkedin_url: &str,
        slug: &str,
    ) -> Result<String, crate::error::ProviderError> {
        let queries = [
            format!("site:linkedin.com \"{slug}\" employees"),
            format!("\"{linkedin_url}\" company size employees"),
        ];

        let mut evidence = Vec::new();
        for query in &queries {
            let response: SearchResponse = services.search(query).await?;
            if let Some(kg) = &response.knowledge_graph {
                if let Some(description) = &kg.description {
                    evidence.push(description.clone());
                }
                for (key, value) in &kg.attributes {
                    evidence.push(format!("{key}: {value}"));
                }
            }
            for result in &response.organic {
                evidence.push(format!("{} — {}", result.title, result.snippet));
            }
        }
        evidence.dedup();
        Ok(evidence.join("\n"))
    }
}

/// Slug of a real company page: not a section, 2..=100 chars, not all
/// digits, no subpage suffix.
fn valid_company_slug(url: &str) -> Option<String> {
    let slug = extract_linkedin_company_slug(url)?;
    if RESERVED_SLUGS.contains(&slug.as_str()) {
        return None;
    }
    // Reject subpages like /company/acme/jobs.
    let after = url.split("/company/").nth(1)?;
    let trimmed = after.trim_end_matches('/');
    if trimmed.contains('/') {
        return None;
    }
    Some(slug)
}

fn score_candidate(
    result: &crate::providers::OrganicResult,
    slug: &str,
    domain: &str,
    company: Option<&str>,
) -> f64 {
    let mut score: f64 = match result.position {
        1 => 0.3,
        2..=3 => 0.2,
        _ => 0.1,
    };
    let haystack = format!("{} {}", result.title, result.snippet).to_ascii_lowercase();
    if haystack.contains(&domain.to_ascii_lowercase()) {
        score += 0.3;
    }
    if let Some(company) = company {
        if result
            .title
            .to_ascii_lowercase()
            .contains(&company.to_ascii_lowercase())
        {
            score += 0.2;
        }
        let slug_norm: String = slug.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let company_norm: String = company
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if slug_norm.to_ascii_lowercase() == company_norm {
            score += 0.2;
        } else if slug_norm.to_ascii_lowercase().contains(&company_norm) && !company_norm.is_empty()
        {
            score += 0.1;
        }
    }
    score.min(1.0)
}

/// Normalize a raw employee-count phrase to a canonical bucket.
pub fn normalize_employee_count(raw: &str) -> &'static str {
    let cleaned = raw.replace([',', ' '], "").to_ascii_lowercase();
    let cleaned = cleaned
        .trim_end_matches("employees")
        .trim_end_matches("employee");

    // Range forms ("51-200", "5,001-10,000").
    if let Some((low, high)) = cleaned.split_once('-') {
        let low: Option<u64> = low.parse().ok();
        let high: Option<u64> = high.trim_end_matches('+').parse().ok();
        if let (Some(low), Some(high)) = (low, high) {
            return bucket_for_bounds(low, high);
        }
    }

    // Open-ended and bare numbers ("10000+", "10,000", "10001+").
    let open_ended = cleaned.ends_with('+');
    if let Ok(n) = cleaned.trim_end_matches('+').parse::<u64>() {
        if open_ended && n >= 10_000 {
            return "10001+";
        }
        return bucket_for_number(n);
    }

    "unknown"
}

fn bucket_for_bounds(low: u64, high: u64) -> &'static str {
    for bucket in BUCKETS {
        if let Some((b_low, b_high)) = bucket_bounds(bucket) {
            if low >= b_low && high <= b_high {
                return bucket;
            }
        }
    }
    bucket_for_number(high)
}

fn bucket_for_number(n: u64) -> &'static str {
    match n {
        0 => "unknown",
        1..=10 => "1-10",
        11..=50 => "11-50",
        51..=200 => "51-200",
        201..=500 => "201-500",
        501..=1000 => "501-1000",
        1001..=5000 => "1001-5000",
        5001..=9999 => "5001-10000",
        // 10,000 reported bare almost always means "10,000 or more".
        _ => "10001+",
    }
}

fn bucket_bounds(bucket: &str) -> Option<(u64, u64)> {
    match bucket {
        "1-10" => Some((1, 10)),
        "11-50" => Some((11, 50)),
        "51-200" => Some((51, 200)),
        "201-500" => Some((201, 500)),
        "501-1000" => Some((501, 1000)),
        "1001-5000" => Some((1001, 5000)),
        "5001-10000" => Some((5001, 10_000)),
        "10001+" => Some((10_001, u64::MAX)),
        _ => None,
    }
}

/// Both signals → actively hiring; one → occasionally; evidence without
/// signals → not hiring; nothing → unknown.
fn hiring_status(actively: bool, jobs_section: bool, has_any_evidence: bool) -> &'static str {
    match (actively, jobs_section) {
        (true, true) => "actively_hiring",
        (true, false) | (false, true) => "occasionally_hiring",
        (false, false) if has_any_evidence => "not_hiring",
        _ => "unknown",
    }
}

fn unknown_output(linkedin_url: Option<String>, confidence: f64, reason: &str) -> OutputMap {
    let mut out = OutputMap::new();
    out.insert(fields::EMPLOYEE_COUNT_RANGE.to_string(), json!("unknown"));
    out.insert(fields::HIRING_STATUS.to_string(), json!("unknown"));
    put_opt(&mut out, fields::LINKEDIN_COMPANY_URL, linkedin_url);
    put_opt(&mut out, fields::INDUSTRY, None);
    put_opt(&mut out, fields::LOCATION, None);
    put_confidence(&mut out, confidence);
    out.insert("_reason".to_string(), json!(reason));
    out.insert("_source".to_string(), json!(TOOL_ID));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{fake_services, hit, organic, FakeExtractor, FakeSearch};
    use std::sync::Arc;

    fn input_for() -> NormalizedInput {
        NormalizedInput {
            row_id: "r1".to_string(),
            domain: Some("linear.app".to_string()),
            company: Some("Linear".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn employee_count_normalization_table() {
        assert_eq!(normalize_employee_count("51-200"), "51-200");
        assert_eq!(normalize_employee_count("5,001-10,000"), "5001-10000");
        assert_eq!(normalize_employee_count("10,000"), "10001+");
        assert_eq!(normalize_employee_count("10000+"), "10001+");
        assert_eq!(normalize_employee_count("10001+"), "10001+");
        assert_eq!(normalize_employee_count("about 37 employees"), "unknown");
        assert_eq!(normalize_employee_count("42"), "11-50");
        assert_eq!(normalize_employee_count("nonsense"), "unknown");
    }

    #[test]
    fn hiring_status_derivation() {
        assert_eq!(hiring_status(true, true, true), "actively_hiring");
        assert_eq!(hiring_status(true, false, true), "occasionally_hiring");
        assert_eq!(hiring_status(false, true, true), "occasionally_hiring");
        assert_eq!(hiring_status(false, false, true), "not_hiring");
        assert_eq!(hiring_status(false, false, false), "unknown");
    }

    #[test]
    fn slug_validation_rejects_sections_and_subpages() {
        assert_eq!(
            valid_company_slug("https://linkedin.com/company/linearapp"),
            Some("linearapp".to_string())
        );
        assert_eq!(valid_company_slug("https://linkedin.com/company/jobs"), None);
        assert_eq!(
            valid_company_slug("https://linkedin.com/company/linearapp/jobs"),
            None
        );
        assert_eq!(valid_company_slug("https://linkedin.com/school/mit"), None);
        assert_eq!(valid_company_slug("https://linkedin.com/company/12345"), None);
    }

    #[tokio::test]
    async fn full_estimate_happy_path() {
        let search = Arc::new(
            FakeSearch::new()
                .on(
                    "site:linkedin.com/company \"linear.app\"",
                    organic(vec![hit(
                        1,
                        "Linear | LinkedIn",
                        "https://www.linkedin.com/company/linearapp",
                        "Linear (linear.app) builds project tracking software.",
                    )]),
                )
                .on(
                    "employees",
                    organic(vec![hit(
                        1,
                        "Linear | LinkedIn",
                        "https://www.linkedin.com/company/linearapp",
                        "Linear | 51-200 employees | See jobs",
                    )]),
                ),
        );
        let extractor = Arc::new(FakeExtractor::new().on(
            "linkedin.com/company/linearapp",
            json!({
                "companyName": "Linear",
                "employeeCount": "51-200",
                "industry": "Software Development",
                "location": "San Francisco",
                "hasJobsSection": true,
                "isActivelyHiring": true,
                "confidence": 0.8
            }),
        ));
        let services = fake_services(Some(search), Some(extractor), None, None).await;

        let out = CompanySizeEstimator
            .execute(&services, &input_for(), &OutputMap::new())
            .await
            .expect("execute");

        assert_eq!(out[fields::EMPLOYEE_COUNT_RANGE], json!("51-200"));
        assert_eq!(out[fields::HIRING_STATUS], json!("actively_hiring"));
        assert_eq!(
            out[fields::LINKEDIN_COMPANY_URL],
            json!("https://linkedin.com/company/linearapp")
        );
        let confidence = out["_confidence"].as_f64().unwrap();
        assert!(confidence > 0.6, "got {confidence}");
    }

    #[tokio::test]
    async fn no_linkedin_page_yields_unknowns() {
        let search = Arc::new(FakeSearch::new());
        let services = fake_services(Some(search), None, None, None).await;

        let out = CompanySizeEstimator
            .execute(&services, &input_for(), &OutputMap::new())
            .await
            .expect("execute");

        assert_eq!(out[fields::EMPLOYEE_COUNT_RANGE], json!("unknown"));
        assert_eq!(out[fields::HIRING_STATUS], json!("unknown"));
        assert_eq!(out[fields::LINKEDIN_COMPANY_URL], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn unknown_bucket_discounts_confidence() {
        let search = Arc::new(
            FakeSearch::new()
                .on(
                    "site:linkedin.com/company",
                    organic(vec![hit(
                        1,
                        "Linear | LinkedIn",
                        "https://www.linkedin.com/company/linearapp",
                        "Linear (linear.app) project tracking.",
                    )]),
                )
                .on(
                    "employees",
                    organic(vec![hit(
                        1,
                        "Linear | LinkedIn",
                        "https://www.linkedin.com/company/linearapp",
                        "Linear builds software.",
                    )]),
                ),
        );
        let extractor = Arc::new(FakeExtractor::new().on(
            "linkedin.com/company/linearapp",
            json!({
                "companyName": "Linear",
                "employeeCount": null,
                "industry": null,
                "location": null,
                "hasJobsSection": false,
                "isActivelyHiring": false,
                "confidence": 0.6
            }),
        ));
        let services = fake_services(Some(search), Some(extractor), None, None).await;

        let out = CompanySizeEstimator
            .execute(&services, &input_for(), &OutputMap::new())
            .await
            .expect("execute");

        assert_eq!(out[fields::EMPLOYEE_COUNT_RANGE], json!("unknown"));
        // Company name present but no hiring signals.
        assert_eq!(out[fields::HIRING_STATUS], json!("not_hiring"));
        let confidence = out["_confidence"].as_f64().unwrap();
        // Mean of (≈0.8 url, 0.6 extract) discounted by 0.7.
        assert!(confidence < 0.6, "got {confidence}");
    }
}
