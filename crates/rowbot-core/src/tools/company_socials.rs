//! Company social links from the company's own pages.
//!
//! Deterministic extraction only: no LLM, no handle guessing. A small set
//! of trusted paths is crawled, anchors are matched against known social
//! hosts, candidates are normalized per platform, ownership-scored, and a
//! link is emitted only when it wins by a clear margin.

use std::collections::BTreeMap;

use serde_json::json;

use super::{lookup_field, put_opt, Tool};
use crate::error::ToolError;
use crate::fields::{self, NormalizedInput, OutputMap};
use crate::providers::html::{self, AnchorHit};
use crate::service::Services;

const TOOL_ID: &str = "fetch_company_socials";

/// Paths crawled off the site root, in order.
const TRUSTED_PATHS: &[&str] = &["/", "/about", "/about-us", "/company", "/contact", "/contact-us"];

/// Minimum winning score.
const MIN_SCORE: f64 = 0.60;
/// Minimum margin over the runner-up.
const MIN_MARGIN: f64 = 0.10;
/// Ownership score ceiling.
const SCORE_CAP: f64 = 0.98;

/// The five platforms this tool resolves.
const PLATFORMS: &[&str] = &[
    fields::TWITTER,
    fields::LINKEDIN,
    fields::GITHUB,
    fields::FACEBOOK,
    fields::INSTAGRAM,
];

/// One social-link candidate accumulated across crawled pages.
#[derive(Debug, Clone)]
struct SocialCandidate {
    platform: &'static str,
    handle: String,
    canonical_url: String,
    in_footer: bool,
    on_root: bool,
    score: f64,
    source_path: String,
}

/// The company socials tool.
pub struct CompanySocialsFetcher;

#[async_trait::async_trait]
impl Tool for CompanySocialsFetcher {
    async fn execute(
        &self,
        services: &Services,
        input: &NormalizedInput,
        acc: &OutputMap,
    ) -> Result<OutputMap, ToolError> {
        let domain = lookup_field(input, acc, fields::DOMAIN)
            .ok_or_else(|| super::missing_input(TOOL_ID, fields::DOMAIN))?;
        let company = lookup_field(input, acc, fields::COMPANY)
            .or_else(|| lookup_field(input, acc, fields::CANONICAL_COMPANY_NAME))
            .unwrap_or_else(|| domain.clone());

        // Crawl the trusted paths; fetch failures drop silently.
        let base = format!("https://{domain}");
        let url0 = format!("{base}{}", TRUSTED_PATHS[0]);
        let url1 = format!("{base}{}", TRUSTED_PATHS[1]);
        let url2 = format!("{base}{}", TRUSTED_PATHS[2]);
        let url3 = format!("{base}{}", TRUSTED_PATHS[3]);
        let url4 = format!("{base}{}", TRUSTED_PATHS[4]);
        let url5 = format!("{base}{}", TRUSTED_PATHS[5]);
        let (p0, p1, p2, p3, p4, p5) = tokio::join!(
            services.fetch_page(&url0),
            services.fetch_page(&url1),
            services.fetch_page(&url2),
            services.fetch_page(&url3),
            services.fetch_page(&url4),
            services.fetch_page(&url5),
        );
        let pages: Vec<(&str, Option<String>)> = vec![
            (TRUSTED_PATHS[0], p0.unwrap_or(None)),
            (TRUSTED_PATHS[1], p1.unwrap_or(None)),
            (TRUSTED_PATHS[2], p2.unwrap_or(None)),
            (TRUSTED_PATHS[3], p3.unwrap_or(None)),
            (TRUSTED_PATHS[4], p4.unwrap_or(None)),
            (TRUSTED_PATHS[5], p5.unwrap_or(None)),
        ];

        // Collect and merge candidates keyed by (platform, handle).
        let mut merged: BTreeMap<(String, String), SocialCandidate> = BTreeMap::new();
        for (path, page) in &pages {
            let Some(body) = page else { continue };
            for anchor in html::anchors(body) {
                let Some(candidate) = candidate_from_anchor(&anchor, path) else {
                    continue;
                };
                let key = (candidate.platform.to_string(), candidate.handle.clone());
                merged
                    .entry(key)
                    .and_modify(|existing| {
                        existing.in_footer |= candidate.in_footer;
                        existing.on_root |= candidate.on_root;
                    })
                    .or_insert(candidate);
            }
        }

        // Score ownership.
        let company_norm = normalize_handle(&company);
        let domain_norm = normalize_handle(domain.split('.').next().unwrap_or(&domain));
        let mut candidates: Vec<SocialCandidate> = merged.into_values().collect();
        for candidate in &mut candidates {
            candidate.score = ownership_score(candidate, &company_norm, &domain_norm);
        }

        // Resolve conflicts per platform.
        let mut out = OutputMap::new();
        let mut details = serde_json::Map::new();
        for platform in PLATFORMS {
            let mut platform_candidates: Vec<&SocialCandidate> = candidates
                .iter()
                .filter(|c| c.platform == *platform)
                .collect();
            platform_candidates
                .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

            let winner = match platform_candidates.as_slice() {
                [] => None,
                [only] => (only.score >= MIN_SCORE).then_some(*only),
                [best, second, ..] => {
                    (best.score >= MIN_SCORE && best.score - second.score >= MIN_MARGIN)
                        .then_some(*best)
                }
            };

            match winner {
                Some(candidate) => {
                    put_opt(&mut out, platform, Some(candidate.canonical_url.clone()));
                    details.insert(
                        (*platform).to_string(),
                        json!({
                            "handle": candidate.handle,
                            "confidence": (candidate.score * 100.0).round() / 100.0,
                            "source": candidate.source_path,
                        }),
                    );
                }
                None => {
                    put_opt(&mut out, platform, None);
                }
            }
        }

        out.insert("_socialDetails".to_string(), serde_json::Value::Object(details));
        out.insert("_source".to_string(), json!(TOOL_ID));
        Ok(out)
    }
}

fn host_of(url: &str) -> Option<String> {
    let after_scheme = url.split("://").nth(1)?;
    let host = after_scheme.split('/').next()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn path_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.find('/').map(|i| rest[i..].to_string()))
        .unwrap_or_else(|| "/".to_string())
}

/// Normalize an anchor into a platform candidate, or reject it.
fn candidate_from_anchor(anchor: &AnchorHit, source_path: &str) -> Option<SocialCandidate> {
    let host = host_of(&anchor.href)?;
    let path = path_of(&anchor.href);
    let path_trimmed = path.trim_end_matches('/');

    let (platform, handle, canonical_url) = match host.as_str() {
        "twitter.com" | "x.com" => {
            let rejects = ["/intent/", "/share", "/status/", "/hashtag/", "/search", "/i/"];
            if rejects.iter().any(|r| path.contains(r)) {
                return None;
            }
            let handle = single_segment(path_trimmed)?;
            if !handle
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
                || handle.len() > 15
            {
                return None;
            }
            (
                fields::TWITTER,
                handle.clone(),
                format!("https://twitter.com/{handle}"),
            )
        }
        "linkedin.com" => {
            let rejects = ["/in/", "/school/", "/jobs/", "/posts/", "/pulse/", "/feed/"];
            if rejects.iter().any(|r| path.contains(r)) {
                return None;
            }
            let handle = path_trimmed.strip_prefix("/company/")?.to_string();
            if handle.is_empty() || handle.contains('/') {
                return None;
            }
            (
                fields::LINKEDIN,
                handle.clone(),
                format!("https://linkedin.com/company/{handle}"),
            )
        }
        "github.com" => {
            let rejects = ["/blob/", "/tree/", "/issues", "/pull", "/releases", "/topics/"];
            if rejects.iter().any(|r| path.contains(r)) {
                return None;
            }
            let handle = single_segment(path_trimmed)?;
            (
                fields::GITHUB,
                handle.clone(),
                format!("https://github.com/{handle}"),
            )
        }
        "facebook.com" | "fb.com" => {
            let rejects = ["/sharer", "/share", "/events/", "/groups/", "/photo", "/watch"];
            if rejects.iter().any(|r| path.contains(r)) {
                return None;
            }
            let handle = single_segment(path_trimmed)?;
            (
                fields::FACEBOOK,
                handle.clone(),
                format!("https://facebook.com/{handle}"),
            )
        }
        "instagram.com" => {
            let rejects = ["/p/", "/reel/", "/explore/", "/stories/"];
            if rejects.iter().any(|r| path.contains(r)) {
                return None;
            }
            let handle = single_segment(path_trimmed)?;
            (
                fields::INSTAGRAM,
                handle.clone(),
                format!("https://instagram.com/{handle}"),
            )
        }
        _ => return None,
    };

    Some(SocialCandidate {
        platform,
        handle,
        canonical_url,
        in_footer: anchor.in_footer,
        on_root: source_path == "/",
        score: 0.0,
        source_path: source_path.to_string(),
    })
}

/// `/handle` with exactly one path segment.
fn single_segment(path: &str) -> Option<String> {
    let segment = path.strip_prefix('/')?;
    if segment.is_empty() || segment.contains('/') || segment.contains('?') {
        return None;
    }
    Some(segment.to_string())
}

fn normalize_handle(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Base 0.5 plus ownership signals, capped at 0.98.
fn ownership_score(candidate: &SocialCandidate, company_norm: &str, domain_norm: &str) -> f64 {
    let mut score: f64 = 0.5;
    let handle_norm = normalize_handle(&candidate.handle);

    let exact_bonus = match candidate.platform {
        fields::LINKEDIN => 0.35,
        fields::TWITTER | fields::GITHUB => 0.30,
        _ => 0.25,
    };
    if !company_norm.is_empty() && handle_norm == *company_norm {
        score += exact_bonus;
    } else if !company_norm.is_empty()
        && (handle_norm.contains(company_norm) || company_norm.contains(&handle_norm))
        && !handle_norm.is_empty()
    {
        score += 0.15;
    }

    if candidate.platform == fields::LINKEDIN {
        // Canonical /company/ URLs only get this far.
        score += 0.20;
    }
    if !domain_norm.is_empty() && handle_norm == *domain_norm {
        score += 0.10;
    }
    if candidate.in_footer {
        score += 0.10;
    }
    if candidate.on_root {
        score += 0.05;
    }

    score.min(SCORE_CAP)
}
