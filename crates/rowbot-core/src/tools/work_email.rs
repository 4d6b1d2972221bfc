//! Work email lookup: LinkedIn-first waterfall over the email-finder
//! provider.
//!
//! Order of preference: a supplied LinkedIn URL, a found-and-trusted
//! LinkedIn URL, then a plain name+domain lookup. Emails are never
//! constructed by pattern; only provider-returned addresses are emitted.

use serde_json::json;

use super::linkedin_finder::LinkedinProfileFinder;
use super::{lookup_field, provider_failure, put_confidence, put_opt, Tool};
use crate::classify::data::is_free_mail_domain;
use crate::error::ToolError;
use crate::fields::{self, email_domain, normalize_domain, split_person_name, NormalizedInput, OutputMap};
use crate::providers::EmailFinderResult;
use crate::service::Services;

const TOOL_ID: &str = "guess_work_email";

/// Minimum finder confidence to trust a discovered LinkedIn anchor.
const ANCHOR_THRESHOLD: f64 = 0.5;

/// Penalty applied for disposable/free-mail answers.
const UNTRUSTED_MAILBOX_PENALTY: f64 = 0.2;

/// The work-email tool.
pub struct WorkEmailGuesser;

#[async_trait::async_trait]
impl Tool for WorkEmailGuesser {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        // 1. Parse and clean the inputs.
        let name = lookup_field(input, acc, fields::NAME)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::NAME))?;
        let (first_name, _last_name) = split_person_name(&name);
        if first_name.is_empty() {
            return Err(super::missing_input(TOOL_ID, fields::NAME));
        }
        let raw_domain = lookup_field(input, acc, fields::DOMAIN)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::DOMAIN))?;
        let domain = normalize_domain(&raw_domain)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::DOMAIN))?;

        let linkedin_url = lookup_field(input, acc, fields::LINKEDIN_URL);
        let company = lookup_field(input, acc, fields::COMPANY);

        // 2. LinkedIn URL supplied: anchor directly.
        if let Some(url) = &linkedin_url {
            match services
                .find_email_by_linkedin(url)
                .await
                .map_err(|e| provider_failure(TOOL_ID, e))?
            {
                Some(result) if result.email.is_some() => {
                    return Ok(success_output(result, "prospeo_linkedin", 1.0));
                }
                _ => {
                    return Ok(not_found_output("no email behind the supplied LinkedIn URL"));
                }
            }
        }

        // 3. Try to find a LinkedIn anchor first.
        if let Some(company) = &company {
            let (found_url, anchor_confidence, _, _) =
                LinkedinProfileFinder::find(services, &name, company).await?;
            if let Some(url) = found_url.filter(|_| anchor_confidence >= ANCHOR_THRESHOLD) {
                if let Some(result) = services
                    .find_email_by_linkedin(&url)
                    .await
                    .map_err(|e| provider_failure(TOOL_ID, e))?
                {
                    if result.email.is_some() {
                        let anchor_factor = 0.9 * anchor_confidence + 0.1;
                        return Ok(success_output(result, "prospeo_linkedin", anchor_factor));
                    }
                }
            }
        }

        // 4. Fall back to name + domain.
        match services
            .find_email_by_name(&name, &domain)
            .await
            .map_err(|e| provider_failure(TOOL_ID, e))?
        {
            Some(result) if result.email.is_some() => {
                Ok(success_output(result, "prospeo", 1.0))
            }
            _ => Ok(not_found_output("provider found no email for this person")),
        }
    }
}

/// Map a provider verification string to the canonical four states.
fn canonical_verification(raw: Option<&str>) -> &'static str {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        Some("VALID") | Some("DELIVERABLE") => "valid",
        Some("INVALID") | Some("UNDELIVERABLE") => "invalid",
        Some("ACCEPT_ALL") | Some("CATCH_ALL") | Some("CATCH-ALL") => "catch_all",
        _ => "unknown",
    }
}

fn success_output(result: EmailFinderResult, source: &str, confidence_factor: f64) -> OutputMap {
    let email = result.email.unwrap_or_default();
    let verification = canonical_verification(result.email_status.as_deref());

    let mut confidence = result.confidence.clamp(0.0, 1.0) * confidence_factor;
    // Catch-all boxes accept anything; lower trust.
    if verification == "catch_all" {
        confidence *= 0.8;
    }
    let disposable = result
        .email_status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("disposable"))
        .unwrap_or(false);
    let free_mailbox = email_domain(&email)
        .map(|d| is_free_mail_domain(&d))
        .unwrap_or(false);
    if disposable || free_mailbox {
        confidence -= UNTRUSTED_MAILBOX_PENALTY;
    }

    let mut out = OutputMap::new();
    put_opt(&mut out, fields::WORK_EMAIL, Some(email));
    out.insert(
        fields::EMAIL_VERIFICATION_STATUS.to_string(),
        json!(verification),
    );
    put_confidence(&mut out, confidence.max(0.0));
    out.insert("_emailSource".to_string(), json!(source));
    out.insert("_source".to_string(), json!(TOOL_ID));
    if let Some(person) = result.person_name {
        out.insert("_matchedPerson".to_string(), json!(person));
    }
    if let Some(title) = result.current_job_title {
        out.insert("_matchedTitle".to_string(), json!(title));
    }
    out
}

fn not_found_output(reason: &str) -> OutputMap {
    let mut out = OutputMap::new();
    put_opt(&mut out, fields::WORK_EMAIL, None);
    out.insert(
        fields::EMAIL_VERIFICATION_STATUS.to_string(),
        json!("unknown"),
    );
    put_confidence(&mut out, 0.0);
    out.insert("_emailSource".to_string(), json!("not_found"));
    out.insert("_reason".to_string(), json!(reason));
    out.insert("_source".to_string(), json!(TOOL_ID));
    out
}
