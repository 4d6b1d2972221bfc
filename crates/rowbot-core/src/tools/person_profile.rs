//! Person public profile decoration: bio and personal social links.
//!
//! Invoked only after identity is confirmed; never decides identity.
//! Snippet-first over four deterministic queries, at most one scrape of a
//! preferred non-blocked page, and strict URL validation on everything the
//! extractor returns.

use serde_json::{json, Value};

use super::{lookup_field, provider_failure, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, NormalizedInput, OutputMap};
use crate::providers::html;
use crate::service::Services;

const TOOL_ID: &str = "fetch_person_profile";

/// Hard cap on the bio length.
const BIO_MAX_CHARS: usize = 300;

/// Body text cap for the single scrape.
const SCRAPE_TEXT_CHARS: usize = 8000;

const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Hosts never scraped for profile decoration.
const BLOCKED_HOSTS: &[&str] = &[
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "zoominfo.com",
    "apollo.io",
    "rocketreach.co",
    "lusha.com",
    "hunter.io",
    "clearbit.com",
    "leadiq.com",
    "seamless.ai",
    "contactout.com",
];

/// Hosts preferred as scrape targets, in order.
const PREFERRED_HOSTS: &[&str] = &[
    "github.com",
    "twitter.com",
    "x.com",
    "medium.com",
    "substack.com",
    "dev.to",
    "indiehackers.com",
    "producthunt.com",
];

fn profile_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "bio": {"type": ["string", "null"]},
            "twitter": {"type": ["string", "null"]},
            "github": {"type": ["string", "null"]},
            "personalWebsite": {"type": ["string", "null"]},
            "confidence": {"type": "number"}
        }
    })
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileExtraction {
    bio: Option<String>,
    twitter: Option<String>,
    github: Option<String>,
    #[serde(rename = "personalWebsite")]
    personal_website: Option<String>,
    #[serde(default)]
    confidence: f64,
}

impl ProfileExtraction {
    fn is_empty(&self) -> bool {
        self.bio.is_none()
            && self.twitter.is_none()
            && self.github.is_none()
            && self.personal_website.is_none()
    }
}

/// The person public-profile tool.
pub struct PersonProfileFetcher;

#[async_trait::async_trait]
impl Tool for PersonProfileFetcher {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let name = lookup_field(input, acc, fields::NAME)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::NAME))?;
        let company = lookup_field(input, acc, fields::COMPANY);

        // 1. Four deterministic queries, deduplicated by URL.
        let mut queries = Vec::new();
        if let Some(company) = &company {
            queries.push(format!("\"{name}\" \"{company}\""));
        }
        queries.push(format!("\"{name}\" twitter"));
        queries.push(format!("\"{name}\" github"));
        queries.push(format!("\"{name}\" personal website blog"));

        let mut seen = std::collections::BTreeSet::new();
        let mut hits = Vec::new();
        for query in &queries {
            let response = services
                .search(query)
                .await
                .map_err(|e| provider_failure(TOOL_ID, e))?;
            for result in response.organic {
                if seen.insert(result.link.clone()) {
                    hits.push(result);
                }
            }
        }

        if hits.is_empty() {
            return Ok(empty_output("no search results"));
        }

        // 2. Snippet-first extraction.
        let listing = hits
            .iter()
            .take(8)
            .map(|r| format!("{} — {}\n{}", r.title, r.link, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");
        let system = "You extract a person's public bio and their own social links from \
                      search results. Use only what is explicitly stated. Return null \
                      for anything not stated.";
        let user = format!("Person: {name}\n\nResults:\n{listing}");
        let mut extraction = self.run_extraction(services, system, &user).await;

        let mut source = "snippets";
        let mut scraped_url = None;

        // 3. One scrape of a preferred page when snippets yield nothing.
        if extraction.is_empty() {
            if let Some(url) = pick_scrape_target(&hits) {
                if let Ok(Some(body)) = services.fetch_page(&url).await {
                    if let Some(text) = html::visible_text(&body, SCRAPE_TEXT_CHARS) {
                        let user = format!("Person: {name}\n\nPage ({url}):\n{text}");
                        let strict = "You extract a person's public bio and their own social \
                                      links from one web page. Return null for any field the \
                                      page does not explicitly state. Never infer.";
                        extraction = self.run_extraction(services, strict, &user).await;
                        source = "scrape";
                        scraped_url = Some(url);
                    }
                }
            }
        }

        if extraction.is_empty() {
            return Ok(empty_output("no public profile evidence"));
        }

        // 4. Validate URLs against expected hostname families; cap the bio.
        let twitter = extraction
            .twitter
            .filter(|url| host_in_family(url, &["twitter.com", "x.com"]));
        let github = extraction
            .github
            .filter(|url| host_in_family(url, &["github.com"]));
        let personal_website = extraction.personal_website.filter(|url| {
            url.starts_with("http")
                && !is_blocked(url)
                && !host_in_family(url, &["twitter.com", "x.com", "github.com"])
        });
        let bio = extraction.bio.map(|b| cap_chars(b.trim(), BIO_MAX_CHARS));

        let mut out = OutputMap::new();
        put_opt(&mut out, fields::BIO, bio);
        put_opt(&mut out, fields::PERSON_TWITTER, twitter);
        put_opt(&mut out, fields::PERSON_GITHUB, github);
        put_opt(&mut out, fields::PERSONAL_WEBSITE, personal_website);
        out.insert("_source".to_string(), json!(source));
        if let Some(url) = scraped_url {
            out.insert("_scrapedUrl".to_string(), json!(url));
        }
        Ok(out)
    }
}

impl PersonProfileFetcher {
    async fn run_extraction(
        &self,
        services: &Services,
        system: &str,
        user: &str,
    ) -> ProfileExtraction {
        match services
            .extract(system, user, &profile_schema(), EXTRACTION_TEMPERATURE)
            .await
        {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => ProfileExtraction::default(),
            Err(e) => {
                tracing::debug!(error = %e, "profile extraction failed");
                ProfileExtraction::default()
            }
        }
    }
}

fn host_of(url: &str) -> String {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

fn host_in_family(url: &str, family: &[&str]) -> bool {
    let host = host_of(url);
    family.iter().any(|f| host == *f || host.ends_with(&format!(".{f}")))
}

fn is_blocked(url: &str) -> bool {
    let host = host_of(url);
    BLOCKED_HOSTS
        .iter()
        .any(|b| host == *b || host.ends_with(&format!(".{b}")))
}

/// Preferred hosts first, then team/about pages, never blocked hosts.
fn pick_scrape_target(hits: &[crate::providers::OrganicResult]) -> Option<String> {
    for &preferred in PREFERRED_HOSTS {
        if let Some(hit) = hits.iter().find(|h| host_in_family(&h.link, &[preferred])) {
            return Some(hit.link.clone());
        }
    }
    if let Some(hit) = hits.iter().find(|h| {
        !is_blocked(&h.link)
            && (h.link.contains("/team") || h.link.contains("/about"))
    }) {
        return Some(hit.link.clone());
    }
    hits.iter()
        .map(|h| h.link.clone())
        .find(|link| !is_blocked(link))
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn empty_output(reason: &str) -> OutputMap {
    let mut out = OutputMap::new();
    put_opt(&mut out, fields::BIO, None);
    put_opt(&mut out, fields::PERSON_TWITTER, None);
    put_opt(&mut out, fields::PERSON_GITHUB, None);
    put_opt(&mut out, fields::PERSONAL_WEBSITE, None);
    out.insert("_source".to_string(), json!("failed"));
    out.insert("_reason".to_string(), json!(reason));
    out
}
