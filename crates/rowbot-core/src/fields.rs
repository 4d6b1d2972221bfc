//! Canonical field names and row-input normalization.
//!
//! Every tool output key must be one of the well-known names declared here;
//! the executor rejects registry entries advertising anything else. Keys
//! prefixed with `_` are tool metadata (confidence, source, reason) that the
//! executor propagates into diagnostics but never treats as row fields.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

// ── Identifying inputs ──────────────────────────────────────────────

/// A person's full name, or a company name when the row is company-shaped.
pub const NAME: &str = "name";
/// Company name.
pub const COMPANY: &str = "company";
/// Company website domain (bare hostname, no scheme).
pub const DOMAIN: &str = "domain";
/// Contact email address.
pub const EMAIL: &str = "email";
/// LinkedIn profile or company page URL.
pub const LINKEDIN_URL: &str = "linkedinUrl";

// ── Company outputs ─────────────────────────────────────────────────

/// Full website URL including scheme.
pub const WEBSITE: &str = "website";
/// Canonical real-world company name resolved from a name string.
pub const CANONICAL_COMPANY_NAME: &str = "canonicalCompanyName";
/// One-paragraph company description.
pub const DESCRIPTION: &str = "description";
/// Industry label.
pub const INDUSTRY: &str = "industry";
/// Founding year.
pub const FOUNDED: &str = "founded";
/// Headquarters location.
pub const LOCATION: &str = "location";
/// Employee count bucket (`1-10` .. `10001+`, or `unknown`).
pub const EMPLOYEE_COUNT_RANGE: &str = "employeeCountRange";
/// Hiring activity (`actively_hiring`, `occasionally_hiring`, `not_hiring`, `unknown`).
pub const HIRING_STATUS: &str = "hiringStatus";
/// Resolved LinkedIn company page URL.
pub const LINKEDIN_COMPANY_URL: &str = "linkedinCompanyUrl";
/// Company Twitter/X profile URL.
pub const TWITTER: &str = "twitter";
/// Company LinkedIn page URL (socials tool output).
pub const LINKEDIN: &str = "linkedin";
/// Company GitHub org URL.
pub const GITHUB: &str = "github";
/// Company Facebook page URL.
pub const FACEBOOK: &str = "facebook";
/// Company Instagram profile URL.
pub const INSTAGRAM: &str = "instagram";

// ── Person outputs ──────────────────────────────────────────────────

/// Current job title.
pub const TITLE: &str = "title";
/// Short biography, at most 300 characters.
pub const BIO: &str = "bio";
/// Person's Twitter/X profile URL.
pub const PERSON_TWITTER: &str = "personTwitter";
/// Person's GitHub profile URL.
pub const PERSON_GITHUB: &str = "personGithub";
/// Personal website or blog URL.
pub const PERSONAL_WEBSITE: &str = "personalWebsite";
/// Verified work email address.
pub const WORK_EMAIL: &str = "workEmail";
/// Verification state of the work email (`valid`, `invalid`, `catch_all`, `unknown`).
pub const EMAIL_VERIFICATION_STATUS: &str = "emailVerificationStatus";

// ── Intermediate / advertised-only outputs ──────────────────────────

/// Raw search snippets gathered by a search step for later steps.
pub const SEARCH_CONTEXT: &str = "searchContext";
/// Technology stack (advertised; no implementation yet).
pub const TECH_STACK: &str = "techStack";
/// Candidate email permutations (advertised; no implementation yet).
pub const EMAIL_CANDIDATES: &str = "emailCandidates";
/// One-line bio (advertised; no implementation yet).
pub const SHORT_BIO: &str = "shortBio";

/// Every field name the executor understands.
pub const KNOWN_FIELDS: &[&str] = &[
    NAME,
    COMPANY,
    DOMAIN,
    EMAIL,
    LINKEDIN_URL,
    WEBSITE,
    CANONICAL_COMPANY_NAME,
    DESCRIPTION,
    INDUSTRY,
    FOUNDED,
    LOCATION,
    EMPLOYEE_COUNT_RANGE,
    HIRING_STATUS,
    LINKEDIN_COMPANY_URL,
    TWITTER,
    LINKEDIN,
    GITHUB,
    FACEBOOK,
    INSTAGRAM,
    TITLE,
    BIO,
    PERSON_TWITTER,
    PERSON_GITHUB,
    PERSONAL_WEBSITE,
    WORK_EMAIL,
    EMAIL_VERIFICATION_STATUS,
    SEARCH_CONTEXT,
    TECH_STACK,
    EMAIL_CANDIDATES,
    SHORT_BIO,
];

/// Flat map of canonical field names to values.
///
/// `BTreeMap` keeps iteration deterministic so repeated enrichments against
/// a warm cache produce byte-identical output.
pub type OutputMap = BTreeMap<String, Value>;

/// Returns true for tool metadata keys (`_confidence`, `_source`, ...).
pub fn is_meta_key(key: &str) -> bool {
    key.starts_with('_')
}

/// Returns true when the value should count as "present" for planning.
pub fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

// ── NormalizedInput ─────────────────────────────────────────────────

/// A row's identifying fields after field-name normalization.
///
/// Immutable per request. Built once from the raw row map; aliases like
/// `company_name`, `website`, or `linkedin_url` collapse into the canonical
/// attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedInput {
    /// Identifier of the row being enriched.
    pub row_id: String,
    /// Person (or single-token company) name.
    pub name: Option<String>,
    /// Company name.
    pub company: Option<String>,
    /// Company domain.
    pub domain: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// LinkedIn URL.
    pub linkedin_url: Option<String>,
}

impl NormalizedInput {
    /// Build a normalized input from a raw row map.
    ///
    /// Field-name aliases are collapsed (`company_name` → company,
    /// `website` → domain, `linkedin_url` → linkedinUrl); empty strings are
    /// treated as absent.
    pub fn from_row(row_id: &str, row: &BTreeMap<String, Value>) -> Self {
        let mut input = NormalizedInput {
            row_id: row_id.to_string(),
            ..Default::default()
        };

        for (key, value) in row {
            let Some(text) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            match normalize_field_name(key).as_str() {
                NAME => input.name = Some(text.to_string()),
                COMPANY => input.company = Some(text.to_string()),
                DOMAIN => input.domain = normalize_domain(text),
                EMAIL => input.email = Some(text.to_string()),
                LINKEDIN_URL => input.linkedin_url = Some(text.to_string()),
                _ => {}
            }
        }

        input
    }

    /// The set of canonical input fields present on this row.
    pub fn available_fields(&self) -> BTreeSet<&'static str> {
        let mut fields = BTreeSet::new();
        if self.name.is_some() {
            fields.insert(NAME);
        }
        if self.company.is_some() {
            fields.insert(COMPANY);
        }
        if self.domain.is_some() {
            fields.insert(DOMAIN);
        }
        if self.email.is_some() {
            fields.insert(EMAIL);
        }
        if self.linkedin_url.is_some() {
            fields.insert(LINKEDIN_URL);
        }
        fields
    }

    /// True when no identifying field is present.
    pub fn is_empty(&self) -> bool {
        self.available_fields().is_empty()
    }
}

/// Collapse a raw row column name into its canonical field name.
pub fn normalize_field_name(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match folded.as_str() {
        "name" | "fullname" | "personname" | "contactname" => NAME.to_string(),
        "company" | "companyname" | "organization" | "organisation" | "employer" => {
            COMPANY.to_string()
        }
        "domain" | "website" | "websiteurl" | "companydomain" | "url" | "site" => {
            DOMAIN.to_string()
        }
        "email" | "emailaddress" | "workemail" => EMAIL.to_string(),
        "linkedin" | "linkedinurl" | "linkedinprofile" => LINKEDIN_URL.to_string(),
        _ => folded,
    }
}

// ── Domain helpers ──────────────────────────────────────────────────

fn domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$")
            .expect("domain regex must compile")
    })
}

/// Normalize a domain-ish string to a bare lowercase hostname.
///
/// Drops the scheme, a leading `www.`, any path, query, port, and trailing
/// dots. Returns `None` when the remainder does not look like a hostname.
/// Idempotent: `normalize_domain(normalize_domain(x)) == normalize_domain(x)`.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let mut s = raw.trim().to_ascii_lowercase();

    if let Some(rest) = s.split("://").nth(1) {
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    for sep in ['/', '?', '#', ':'] {
        if let Some(idx) = s.find(sep) {
            s.truncate(idx);
        }
    }
    let s = s.trim_end_matches('.').to_string();

    if domain_re().is_match(&s) {
        Some(s)
    } else {
        None
    }
}

/// True when the string already is a well-formed bare domain.
pub fn is_valid_domain(s: &str) -> bool {
    domain_re().is_match(s)
}

// ── LinkedIn helpers ────────────────────────────────────────────────

fn linkedin_person_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"linkedin\.com/in/([A-Za-z0-9\-_%]+)").expect("linkedin person regex")
    })
}

fn linkedin_company_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"linkedin\.com/company/([A-Za-z0-9\-_%]+)").expect("linkedin company regex")
    })
}

/// Extract the profile slug from a LinkedIn person URL.
///
/// Accepts bare and schemed forms; rejects slugs that are a single
/// character or entirely numeric.
pub fn extract_linkedin_person_slug(url: &str) -> Option<String> {
    let caps = linkedin_person_re().captures(url)?;
    let slug = caps.get(1)?.as_str().trim_end_matches('/').to_string();
    if slug.len() < 2 || slug.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(slug)
}

/// Extract the company slug from a LinkedIn company URL.
pub fn extract_linkedin_company_slug(url: &str) -> Option<String> {
    let caps = linkedin_company_re().captures(url)?;
    let slug = caps.get(1)?.as_str().trim_end_matches('/').to_string();
    if slug.len() < 2 || slug.len() > 100 || slug.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(slug)
}

// ── Email helpers ───────────────────────────────────────────────────

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email regex")
    })
}

/// True when the string is a well-formed email address.
pub fn is_well_formed_email(s: &str) -> bool {
    email_re().is_match(s.trim())
}

/// The domain part of an email address, lowercased.
pub fn email_domain(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if !is_well_formed_email(trimmed) {
        return None;
    }
    trimmed
        .rsplit('@')
        .next()
        .map(|d| d.to_ascii_lowercase())
}

/// Split a full name into `(first, last)` for email-finder providers.
///
/// One token yields a first name only; two tokens map directly; three or
/// more tokens join everything after the first into the last name.
pub fn split_person_name(full_name: &str) -> (String, Option<String>) {
    let tokens: Vec<&str> = full_name.split_whitespace().collect();
    match tokens.as_slice() {
        [] => (String::new(), None),
        [first] => ((*first).to_string(), None),
        [first, rest @ ..] => ((*first).to_string(), Some(rest.join(" "))),
    }
}
