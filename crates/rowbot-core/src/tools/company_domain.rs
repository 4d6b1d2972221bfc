//! Company identity from a domain.
//!
//! Normalizes the domain, verifies reachability through a metadata fetch,
//! and derives the company name from the homepage title. The domain itself
//! is the identity anchor; this tool only confirms it points at a live
//! company site.

use serde_json::json;

use super::{lookup_field, provider_failure, put_confidence, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, normalize_domain, NormalizedInput, OutputMap};
use crate::providers::html;
use crate::service::Services;

const TOOL_ID: &str = "resolve_company_from_domain";

/// The domain → company resolver tool.
pub struct CompanyDomainResolver;

#[async_trait::async_trait]
impl Tool for CompanyDomainResolver {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let raw = lookup_field(input, acc, fields::DOMAIN)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::DOMAIN))?;

        let Some(domain) = normalize_domain(&raw) else {
            let mut out = OutputMap::new();
            put_opt(&mut out, fields::COMPANY, None);
            put_opt(&mut out, fields::DOMAIN, None);
            put_opt(&mut out, fields::WEBSITE, None);
            put_confidence(&mut out, 0.0);
            out.insert("_status".to_string(), json!("invalid"));
            out.insert("_reason".to_string(), json!(format!("'{raw}' is not a valid domain")));
            return Ok(out);
        };

        let website = format!("https://{domain}");
        let page = services
            .fetch_page(&website)
            .await
            .map_err(|e| provider_failure(TOOL_ID, e))?;

        let (title, description) = match &page {
            Some(body) => (html::page_title(body), html::meta_description(body)),
            None => (None, None),
        };

        let reachable = page.is_some() && (title.is_some() || description.is_some());
        let company = title.as_deref().and_then(name_from_title);

        let mut out = OutputMap::new();
        if reachable {
            put_opt(&mut out, fields::COMPANY, company);
            put_opt(&mut out, fields::DOMAIN, Some(domain.clone()));
            put_opt(&mut out, fields::WEBSITE, Some(website));
            put_confidence(&mut out, 0.9);
            out.insert("_status".to_string(), json!("valid"));
        } else {
            put_opt(&mut out, fields::COMPANY, None);
            put_opt(&mut out, fields::DOMAIN, Some(domain.clone()));
            put_opt(&mut out, fields::WEBSITE, None);
            put_confidence(&mut out, 0.0);
            out.insert("_status".to_string(), json!("invalid"));
            out.insert(
                "_reason".to_string(),
                json!(format!("{domain} is unreachable or has no metadata")),
            );
        }
        out.insert("_source".to_string(), json!(TOOL_ID));

        tracing::debug!(domain = %domain, reachable, "domain resolved");
        Ok(out)
    }
}

/// First segment of a homepage title, before any tagline separator.
fn name_from_title(title: &str) -> Option<String> {
    let head = ["—", "–", "|", " - ", ":"]
        .iter()
        .fold(title.to_string(), |acc, sep| {
            acc.split(sep).next().unwrap_or(&acc).to_string()
        });
    let trimmed = head.trim().to_string();
    if trimmed.len() < 2 || trimmed.len() > 80 {
        None
    } else {
        Some(trimmed)
    }
}
