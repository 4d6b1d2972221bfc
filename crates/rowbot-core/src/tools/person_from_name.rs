//! Person resolution from name + company.
//!
//! Orchestrates the LinkedIn finder and the snippet-first resolver: anchor
//! on a found profile URL when the finder is confident, otherwise resolve
//! un-anchored and tag the result accordingly.

use serde_json::json;

use super::linkedin_finder::LinkedinProfileFinder;
use super::person_resolve::PersonFromLinkedinResolver;
use super::{lookup_field, put_confidence, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, NormalizedInput, OutputMap};
use crate::service::Services;

const TOOL_ID: &str = "resolve_person_from_name";

/// Finder confidence below which the URL anchor is not trusted.
const ANCHOR_THRESHOLD: f64 = 0.5;

/// The name+company person resolver tool.
pub struct PersonFromNameResolver;

#[async_trait::async_trait]
impl Tool for PersonFromNameResolver {
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

        let (anchor_url, anchor_confidence, _candidates, _reason) =
            LinkedinProfileFinder::find(services, &name, &company).await?;

        let anchored = anchor_url
            .as_deref()
            .filter(|_| anchor_confidence >= ANCHOR_THRESHOLD);

        let mut out = match anchored {
            Some(url) => {
                let mut resolved = PersonFromLinkedinResolver::resolve(
                    services,
                    Some(url),
                    Some(&name),
                    Some(&company),
                )
                .await?;

                let extraction_confidence = resolved
                    .get("_confidence")
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(0.0);
                let blended =
                    (0.4 * anchor_confidence + 0.6 * extraction_confidence).min(0.95);
                put_confidence(&mut resolved, blended);
                put_opt(&mut resolved, fields::LINKEDIN_URL, Some(url.to_string()));
                resolved.insert("_linkedinAnchored".to_string(), json!(true));
                resolved.insert("_resolutionStatus".to_string(), json!("anchored"));
                resolved
            }
            None => {
                let mut resolved = PersonFromLinkedinResolver::resolve(
                    services,
                    None,
                    Some(&name),
                    Some(&company),
                )
                .await?;

                let found_anything = resolved
                    .iter()
                    .any(|(k, v)| !crate::fields::is_meta_key(k) && !v.is_null());
                resolved.insert("_linkedinAnchored".to_string(), json!(false));
                resolved.insert(
                    "_resolutionStatus".to_string(),
                    json!(if found_anything { "ambiguous" } else { "not_found" }),
                );
                resolved
            }
        };

        out.insert("_source".to_string(), json!(TOOL_ID));
        out.insert(
            "_anchorConfidence".to_string(),
            json!((anchor_confidence * 1000.0).round() / 1000.0),
        );
        Ok(out)
    }
}
