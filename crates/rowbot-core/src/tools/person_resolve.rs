//! Person resolution from search snippets.
//!
//! Snippet-first: structured extraction over titles and snippets of search
//! results pointing at LinkedIn. When snippets fill at least three of the
//! four core fields, the tool stops. At most one non-LinkedIn page is
//! scraped as a fallback, and scrape-derived values never overwrite
//! snippet-derived ones. This tool never fetches linkedin.com.

use serde_json::{json, Value};

use super::{lookup_field, provider_failure, put_confidence, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, extract_linkedin_person_slug, NormalizedInput, OutputMap};
use crate::providers::html;
use crate::service::Services;

const TOOL_ID: &str = "resolve_person_from_linkedin";

/// Snippet-derived fields sufficient to stop before any scrape.
const SNIPPET_SUFFICIENT_FIELDS: usize = 3;

/// Body text cap for the single fallback scrape.
const SCRAPE_TEXT_CHARS: usize = 8000;

const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Hosts the fallback scrape must never touch: LinkedIn itself, social
/// networks, contact-data aggregators, and business-magazine profiles.
const BLOCKED_SCRAPE_HOSTS: &[&str] = &[
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "x.com",
    "twitter.com",
    "zoominfo.com",
    "apollo.io",
    "rocketreach.co",
    "lusha.com",
    "hunter.io",
    "clearbit.com",
    "leadiq.com",
    "seamless.ai",
    "contactout.com",
    "crunchbase.com",
    "forbes.com",
    "bloomberg.com",
    "businessinsider.com",
];

fn person_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": ["string", "null"]},
            "title": {"type": ["string", "null"]},
            "company": {"type": ["string", "null"]},
            "location": {"type": ["string", "null"]},
            "confidence": {"type": "number"}
        }
    })
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PersonExtraction {
    name: Option<String>,
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    #[serde(default)]
    confidence: f64,
}

impl PersonExtraction {
    fn filled_fields(&self) -> Vec<&'static str> {
        let mut filled = Vec::new();
        if self.name.is_some() {
            filled.push(fields::NAME);
        }
        if self.title.is_some() {
            filled.push(fields::TITLE);
        }
        if self.company.is_some() {
            filled.push(fields::COMPANY);
        }
        if self.location.is_some() {
            filled.push(fields::LOCATION);
        }
        filled
    }
}

/// The snippet-first person resolver.
pub struct PersonFromLinkedinResolver;

impl PersonFromLinkedinResolver {
    /// Resolve with explicit inputs; shared with the orchestrator.
    pub async fn resolve(
        services: &Services,
        linkedin_url: Option<&str>,
        name: Option<&str>,
        company: Option<&str>,
    ) -> Result<OutputMap, ToolError> {
        // 1. Build the search query.
        let query = if let Some(url) = linkedin_url {
            let slug = extract_linkedin_person_slug(url)
                .ok_or_else(|| super::missing_input(TOOL_ID, fields::LINKEDIN_URL))?;
            format!("site:linkedin.com/in \"{slug}\"")
        } else if let (Some(name), Some(company)) = (name, company) {
            format!("\"{name}\" \"{company}\" LinkedIn")
        } else if let Some(name) = name {
            format!("\"{name}\" LinkedIn profile")
        } else {
            return Err(super::missing_input(TOOL_ID, fields::NAME));
        };

        // 2. Search (cached, up to 10 hits used).
        let response = services
            .search(&query)
            .await
            .map_err(|e| provider_failure(TOOL_ID, e))?;
        let hits: Vec<_> = response.organic.iter().take(10).collect();

        if hits.is_empty() {
            return Ok(failed_output(linkedin_url, "no search results"));
        }

        // 3. Snippet extraction over the top five hits.
        let listing = hits
            .iter()
            .take(5)
            .map(|r| format!("{} — {}\n{}", r.title, r.link, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");
        let system = "You extract facts about one person from search result titles \
                      and snippets. Use only what is explicitly stated. Return null \
                      for anything not stated.";
        let user = format!(
            "Person hint: {}\nCompany hint: {}\n\nResults:\n{listing}",
            name.unwrap_or("(unknown)"),
            company.unwrap_or("(unknown)"),
        );
        let snippet_extraction = match services
            .extract(system, &user, &person_schema(), EXTRACTION_TEMPERATURE)
            .await
        {
            Ok(Some(value)) => serde_json::from_value::<PersonExtraction>(value).unwrap_or_default(),
            Ok(None) => PersonExtraction::default(),
            Err(e) => {
                tracing::debug!(error = %e, "snippet extraction failed");
                PersonExtraction::default()
            }
        };

        let from_snippets = snippet_extraction.filled_fields();
        if from_snippets.len() >= SNIPPET_SUFFICIENT_FIELDS {
            return Ok(build_output(
                snippet_extraction,
                linkedin_url,
                "snippets",
                from_snippets,
                Vec::new(),
            ));
        }

        // 4. Fallback: scrape at most one non-blocked page.
        let scrape_url = hits
            .iter()
            .map(|r| r.link.as_str())
            .find(|url| !is_blocked_host(url));
        let mut merged = snippet_extraction.clone();
        let mut from_scrape = Vec::new();
        let mut scraped = false;

        if let Some(url) = scrape_url {
            if let Ok(Some(body)) = services.fetch_page(url).await {
                if let Some(text) = html::visible_text(&body, SCRAPE_TEXT_CHARS) {
                    let system = "You extract facts about one person from a web page. \
                                  Return null for any field the page does not explicitly \
                                  state. Never infer.";
                    let user = format!(
                        "Person hint: {}\n\nPage ({url}):\n{text}",
                        name.unwrap_or("(unknown)"),
                    );
                    if let Ok(Some(value)) = services
                        .extract(system, &user, &person_schema(), EXTRACTION_TEMPERATURE)
                        .await
                    {
                        if let Ok(page_extraction) =
                            serde_json::from_value::<PersonExtraction>(value)
                        {
                            scraped = true;
                            // Snippet-derived fields are never overwritten.
                            if merged.name.is_none() {
                                merged.name = page_extraction.name;
                                if merged.name.is_some() {
                                    from_scrape.push(fields::NAME);
                                }
                            }
                            if merged.title.is_none() {
                                merged.title = page_extraction.title;
                                if merged.title.is_some() {
                                    from_scrape.push(fields::TITLE);
                                }
                            }
                            if merged.company.is_none() {
                                merged.company = page_extraction.company;
                                if merged.company.is_some() {
                                    from_scrape.push(fields::COMPANY);
                                }
                            }
                            if merged.location.is_none() {
                                merged.location = page_extraction.location;
                                if merged.location.is_some() {
                                    from_scrape.push(fields::LOCATION);
                                }
                            }
                        }
                    }
                }
            }
        }

        if merged.filled_fields().is_empty() {
            return Ok(failed_output(linkedin_url, "no fields extractable"));
        }

        let source = if scraped { "snippets+scrape" } else { "snippets" };
        Ok(build_output(
            merged,
            linkedin_url,
            source,
            from_snippets,
            from_scrape,
        ))
    }
}

#[async_trait::async_trait]
impl Tool for PersonFromLinkedinResolver {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let url = lookup_field(input, acc, fields::LINKEDIN_URL);
        let name = lookup_field(input, acc, fields::NAME);
        let company = lookup_field(input, acc, fields::COMPANY);
        Self::resolve(services, url.as_deref(), name.as_deref(), company.as_deref()).await
    }
}

/// Generic web search step for person rows: snippet context for later
/// steps and the resolvers' fallback.
pub struct PersonWebSearch;

#[async_trait::async_trait]
impl Tool for PersonWebSearch {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let name = lookup_field(input, acc, fields::NAME)
            .ok_or_else(|| super::missing_input("search_person_web", fields::NAME))?;
        let company = lookup_field(input, acc, fields::COMPANY);

        let query = match &company {
            Some(company) => format!("\"{name}\" \"{company}\""),
            None => format!("\"{name}\""),
        };
        let response = services
            .search(&query)
            .await
            .map_err(|e| provider_failure("search_person_web", e))?;

        let context: Vec<String> = response
            .organic
            .iter()
            .take(5)
            .map(|r| format!("{} — {}", r.title, r.snippet))
            .collect();

        let mut out = OutputMap::new();
        if context.is_empty() {
            out.insert(fields::SEARCH_CONTEXT.to_string(), Value::Null);
        } else {
            out.insert(fields::SEARCH_CONTEXT.to_string(), json!(context.join("\n")));
        }
        out.insert("_source".to_string(), json!("search_person_web"));
        Ok(out)
    }
}

fn is_blocked_host(url: &str) -> bool {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    BLOCKED_SCRAPE_HOSTS
        .iter()
        .any(|blocked| host == *blocked || host.ends_with(&format!(".{blocked}")))
}

fn confidence_for(extraction: &PersonExtraction, scraped: bool) -> f64 {
    let mut confidence: f64 = 0.0;
    if extraction.name.is_some() {
        confidence += 0.30;
    }
    if extraction.title.is_some() {
        confidence += 0.25;
    }
    if extraction.company.is_some() {
        confidence += 0.25;
    }
    if extraction.location.is_some() {
        confidence += 0.20;
    }
    confidence.min(if scraped { 0.80 } else { 0.75 })
}

fn build_output(
    extraction: PersonExtraction,
    linkedin_url: Option<&str>,
    source: &str,
    from_snippets: Vec<&'static str>,
    from_scrape: Vec<&'static str>,
) -> OutputMap {
    let confidence = confidence_for(&extraction, source == "snippets+scrape");
    let mut out = OutputMap::new();
    put_opt(&mut out, fields::NAME, extraction.name);
    put_opt(&mut out, fields::TITLE, extraction.title);
    put_opt(&mut out, fields::COMPANY, extraction.company);
    put_opt(&mut out, fields::LOCATION, extraction.location);
    put_opt(
        &mut out,
        fields::LINKEDIN_URL,
        linkedin_url.map(str::to_string),
    );
    put_confidence(&mut out, confidence);
    out.insert("_source".to_string(), json!(source));
    out.insert("_fieldsFromSnippets".to_string(), json!(from_snippets));
    out.insert("_fieldsFromScrape".to_string(), json!(from_scrape));
    out
}

fn failed_output(linkedin_url: Option<&str>, reason: &str) -> OutputMap {
    let mut out = OutputMap::new();
    put_opt(&mut out, fields::NAME, None);
    put_opt(&mut out, fields::TITLE, None);
    put_opt(&mut out, fields::COMPANY, None);
    put_opt(&mut out, fields::LOCATION, None);
    put_opt(
        &mut out,
        fields::LINKEDIN_URL,
        linkedin_url.map(str::to_string),
    );
    put_confidence(&mut out, 0.0);
    out.insert("_source".to_string(), json!("failed"));
    out.insert("_reason".to_string(), json!(reason));
    out
}
