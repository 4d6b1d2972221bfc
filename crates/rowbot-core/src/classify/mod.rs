//! Deterministic input classifier.
//!
//! `classify` is a pure function from a normalized row to a classification:
//! no I/O, no clock, no randomness. The same input always produces the same
//! result, which the planner and executor treat as ground truth.

pub mod data;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::fields::{
    self, extract_linkedin_company_slug, extract_linkedin_person_slug, NormalizedInput,
};

/// What kind of real-world entity the row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityType {
    /// A person.
    Person,
    /// A company.
    Company,
    /// Could not be determined.
    Unknown,
}

/// How strongly the inputs pin down one real-world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdentityStrength {
    /// An identity anchor is present (LinkedIn URL, well-formed domain).
    Strong,
    /// Enough to hypothesize and score (name+company, bare company, work email).
    Moderate,
    /// A bare person name.
    Weak,
    /// Nothing usable.
    Invalid,
}

/// The seven input signatures, checked in order; first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputSignature {
    /// `linkedin.com/in/<slug>`.
    PersonLinkedinUrl,
    /// `linkedin.com/company/<slug>`.
    CompanyLinkedinUrl,
    /// A bare, well-formed company domain.
    CompanyDomain,
    /// Person name plus company name.
    PersonNameCompany,
    /// A company-shaped name, or only the company field.
    CompanyNameOnly,
    /// A person name and nothing else.
    PersonNameOnly,
    /// A well-formed non-free-mail email.
    PersonEmail,
    /// Nothing matched.
    Unknown,
}

/// Risk that the inputs match multiple real-world entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AmbiguityRisk {
    /// Effectively unambiguous.
    Low,
    /// Some risk; scoring required.
    Medium,
    /// Many plausible matches.
    High,
}

/// Coarse policy the planner follows when composing steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// An anchor exists; resolve it directly.
    DirectLookup,
    /// Generate a hypothesis and score candidates.
    HypothesisAndScore,
    /// Search broadly, then validate.
    SearchAndValidate,
    /// Do not make any external call.
    FailFast,
}

/// Caps what downstream tools may emit for this row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SensitivityLevel {
    /// Broadest: all well-known fields may be emitted.
    Public,
    /// Everything may be emitted; confidence metadata is capped.
    Limited,
    /// Personally-identifying contact fields are withheld.
    Private,
    /// No external calls at all (always paired with FAIL_FAST).
    Restricted,
}

/// The classifier's verdict for one row.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    /// Entity kind.
    pub entity_type: EntityType,
    /// Identity strength.
    pub identity_strength: IdentityStrength,
    /// Which signature matched.
    pub input_signature: InputSignature,
    /// Ambiguity risk.
    pub ambiguity_risk: AmbiguityRisk,
    /// Planning strategy.
    pub strategy: Strategy,
    /// Output sensitivity cap.
    pub sensitivity_level: SensitivityLevel,
    /// Fields the signature requires.
    pub required_fields: Vec<&'static str>,
    /// Fields present on the row.
    pub available_fields: BTreeSet<&'static str>,
    /// Why the row fails fast, when it does.
    pub fail_reason: Option<String>,
    /// Human-readable summary of the decision.
    pub reason: String,
}

/// Classify a normalized row. Pure and deterministic.
pub fn classify(input: &NormalizedInput) -> ClassificationResult {
    let available = input.available_fields();
    let (signature, entity_type, required) = detect_signature(input);

    let identity_strength = strength_for(input, signature);
    let ambiguity_risk = ambiguity_for(input, signature, identity_strength);
    let mut strategy = strategy_for(signature, identity_strength);

    let mut fail_reason = None;
    if identity_strength == IdentityStrength::Invalid {
        strategy = Strategy::FailFast;
        fail_reason = Some(match signature {
            InputSignature::Unknown if available.is_empty() => {
                "No existing data in row".to_string()
            }
            _ => "No usable identifying fields".to_string(),
        });
    } else if !required.iter().all(|f| available.contains(f)) {
        let missing: Vec<&str> = required
            .iter()
            .filter(|f| !available.contains(*f))
            .copied()
            .collect();
        strategy = Strategy::FailFast;
        fail_reason = Some(format!("Missing required fields: {}", missing.join(", ")));
    }

    let sensitivity_level = sensitivity_for(identity_strength, ambiguity_risk);

    let reason = format!(
        "{signature:?}: {entity_type:?} entity, {identity_strength:?} identity, {ambiguity_risk:?} ambiguity"
    );

    ClassificationResult {
        entity_type,
        identity_strength,
        input_signature: signature,
        ambiguity_risk,
        strategy,
        sensitivity_level,
        required_fields: required,
        available_fields: available,
        fail_reason,
        reason,
    }
}

/// True when a name string reads as a company rather than a person.
///
/// Legal suffixes are the strong signal; a single-token name with no other
/// person evidence also reads as a company ("Stripe", "Linear").
pub fn is_company_shaped(name: &str) -> bool {
    if data::has_legal_suffix(name) {
        return true;
    }
    name.split_whitespace().count() == 1
}

fn detect_signature(
    input: &NormalizedInput,
) -> (InputSignature, EntityType, Vec<&'static str>) {
    // 1-2. LinkedIn URLs.
    if let Some(url) = &input.linkedin_url {
        if extract_linkedin_person_slug(url).is_some() {
            return (
                InputSignature::PersonLinkedinUrl,
                EntityType::Person,
                vec![fields::LINKEDIN_URL],
            );
        }
        if extract_linkedin_company_slug(url).is_some() {
            return (
                InputSignature::CompanyLinkedinUrl,
                EntityType::Company,
                vec![fields::LINKEDIN_URL],
            );
        }
    }

    // 3. Bare domain.
    if let Some(domain) = &input.domain {
        if input.name.is_none() && input.email.is_none() && fields::is_valid_domain(domain) {
            return (
                InputSignature::CompanyDomain,
                EntityType::Company,
                vec![fields::DOMAIN],
            );
        }
    }

    // 4. Person name + company.
    if let (Some(name), Some(_)) = (&input.name, &input.company) {
        if !is_company_shaped(name) {
            return (
                InputSignature::PersonNameCompany,
                EntityType::Person,
                vec![fields::NAME, fields::COMPANY],
            );
        }
    }

    // 5. Company-shaped name, or only the company field.
    if let Some(name) = &input.name {
        if is_company_shaped(name) {
            return (
                InputSignature::CompanyNameOnly,
                EntityType::Company,
                vec![fields::NAME],
            );
        }
    } else if input.company.is_some() {
        return (
            InputSignature::CompanyNameOnly,
            EntityType::Company,
            vec![fields::COMPANY],
        );
    }

    // 6. Bare person name.
    if input.name.is_some()
        && input.company.is_none()
        && input.email.is_none()
        && input.linkedin_url.is_none()
    {
        return (
            InputSignature::PersonNameOnly,
            EntityType::Person,
            vec![fields::NAME],
        );
    }

    // 7. Non-free-mail email.
    if let Some(email) = &input.email {
        if let Some(domain) = fields::email_domain(email) {
            if !data::is_free_mail_domain(&domain) {
                return (
                    InputSignature::PersonEmail,
                    EntityType::Person,
                    vec![fields::EMAIL],
                );
            }
        }
    }

    (InputSignature::Unknown, EntityType::Unknown, vec![])
}

fn strength_for(input: &NormalizedInput, signature: InputSignature) -> IdentityStrength {
    match signature {
        InputSignature::PersonLinkedinUrl
        | InputSignature::CompanyLinkedinUrl
        | InputSignature::CompanyDomain => IdentityStrength::Strong,
        InputSignature::PersonNameCompany => {
            let name = input.name.as_deref().unwrap_or_default();
            let company = input.company.as_deref().unwrap_or_default();
            if data::has_common_first_name(name) && data::is_big_brand(company) {
                IdentityStrength::Weak
            } else {
                IdentityStrength::Moderate
            }
        }
        InputSignature::CompanyNameOnly | InputSignature::PersonEmail => {
            IdentityStrength::Moderate
        }
        InputSignature::PersonNameOnly => IdentityStrength::Weak,
        InputSignature::Unknown => IdentityStrength::Invalid,
    }
}

fn ambiguity_for(
    input: &NormalizedInput,
    signature: InputSignature,
    strength: IdentityStrength,
) -> AmbiguityRisk {
    match signature {
        InputSignature::PersonLinkedinUrl | InputSignature::CompanyLinkedinUrl => {
            AmbiguityRisk::Low
        }
        _ if strength == IdentityStrength::Strong => AmbiguityRisk::Low,
        InputSignature::PersonNameCompany => {
            let name = input.name.as_deref().unwrap_or_default();
            let company = input.company.as_deref().unwrap_or_default();
            if data::has_common_first_name(name) && data::is_big_brand(company) {
                AmbiguityRisk::High
            } else {
                AmbiguityRisk::Medium
            }
        }
        InputSignature::CompanyNameOnly => {
            let company_name = input
                .company
                .as_deref()
                .or(input.name.as_deref())
                .unwrap_or_default();
            if data::has_generic_prefix(company_name) {
                AmbiguityRisk::High
            } else {
                AmbiguityRisk::Medium
            }
        }
        InputSignature::PersonNameOnly => AmbiguityRisk::High,
        _ => AmbiguityRisk::Medium,
    }
}

fn strategy_for(signature: InputSignature, strength: IdentityStrength) -> Strategy {
    if strength == IdentityStrength::Invalid {
        return Strategy::FailFast;
    }
    match signature {
        InputSignature::PersonLinkedinUrl
        | InputSignature::CompanyLinkedinUrl
        | InputSignature::CompanyDomain => Strategy::DirectLookup,
        InputSignature::PersonNameCompany | InputSignature::CompanyNameOnly => {
            Strategy::HypothesisAndScore
        }
        _ => Strategy::SearchAndValidate,
    }
}

/// Total function of (strength, ambiguity).
fn sensitivity_for(strength: IdentityStrength, ambiguity: AmbiguityRisk) -> SensitivityLevel {
    match (strength, ambiguity) {
        (IdentityStrength::Invalid, _) => SensitivityLevel::Restricted,
        (IdentityStrength::Strong, AmbiguityRisk::Low) => SensitivityLevel::Public,
        (IdentityStrength::Strong, _) => SensitivityLevel::Limited,
        (IdentityStrength::Moderate, AmbiguityRisk::High) => SensitivityLevel::Private,
        (IdentityStrength::Moderate, _) => SensitivityLevel::Limited,
        (IdentityStrength::Weak, _) => SensitivityLevel::Private,
    }
}

/// Whether a field may be emitted at this sensitivity level.
///
/// `Private` withholds contact fields; `Restricted` rows never reach the
/// executor, but the function is total anyway.
pub fn field_allowed(sensitivity: SensitivityLevel, field: &str) -> bool {
    match sensitivity {
        SensitivityLevel::Public | SensitivityLevel::Limited => true,
        SensitivityLevel::Private => {
            !matches!(field, fields::EMAIL | fields::WORK_EMAIL)
        }
        SensitivityLevel::Restricted => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn row(pairs: &[(&str, &str)]) -> NormalizedInput {
        let map: BTreeMap<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), json!(v)))
            .collect();
        NormalizedInput::from_row("r1", &map)
    }

    #[test]
    fn person_linkedin_url_is_strong_direct() {
        let c = classify(&row(&[("linkedin_url", "https://linkedin.com/in/karrisaarinen")]));
        assert_eq!(c.input_signature, InputSignature::PersonLinkedinUrl);
        assert_eq!(c.entity_type, EntityType::Person);
        assert_eq!(c.identity_strength, IdentityStrength::Strong);
        assert_eq!(c.ambiguity_risk, AmbiguityRisk::Low);
        assert_eq!(c.strategy, Strategy::DirectLookup);
        assert_eq!(c.sensitivity_level, SensitivityLevel::Public);
    }

    #[test]
    fn company_linkedin_url_detected() {
        let c = classify(&row(&[("linkedin", "https://linkedin.com/company/linearapp")]));
        assert_eq!(c.input_signature, InputSignature::CompanyLinkedinUrl);
        assert_eq!(c.entity_type, EntityType::Company);
        assert_eq!(c.strategy, Strategy::DirectLookup);
    }

    #[test]
    fn bare_domain_is_strong_direct() {
        let c = classify(&row(&[("domain", "stripe.com")]));
        assert_eq!(c.input_signature, InputSignature::CompanyDomain);
        assert_eq!(c.identity_strength, IdentityStrength::Strong);
        assert_eq!(c.strategy, Strategy::DirectLookup);
    }

    #[test]
    fn name_company_is_moderate_hypothesis() {
        let c = classify(&row(&[("name", "Karri Saarinen"), ("company", "Linear")]));
        assert_eq!(c.input_signature, InputSignature::PersonNameCompany);
        assert_eq!(c.identity_strength, IdentityStrength::Moderate);
        assert_eq!(c.ambiguity_risk, AmbiguityRisk::Medium);
        assert_eq!(c.strategy, Strategy::HypothesisAndScore);
    }

    #[test]
    fn common_name_at_big_brand_downgrades() {
        let c = classify(&row(&[("name", "John Smith"), ("company", "Google")]));
        assert_eq!(c.identity_strength, IdentityStrength::Weak);
        assert_eq!(c.ambiguity_risk, AmbiguityRisk::High);
        // Weak identity keeps the signature's hypothesis strategy.
        assert_eq!(c.strategy, Strategy::HypothesisAndScore);
        assert_eq!(c.sensitivity_level, SensitivityLevel::Private);
    }

    #[test]
    fn single_token_name_reads_as_company() {
        let c = classify(&row(&[("name", "Stripe")]));
        assert_eq!(c.input_signature, InputSignature::CompanyNameOnly);
        assert_eq!(c.entity_type, EntityType::Company);
        assert_eq!(c.strategy, Strategy::HypothesisAndScore);
        assert_eq!(c.ambiguity_risk, AmbiguityRisk::Medium);
    }

    #[test]
    fn legal_suffix_name_reads_as_company() {
        let c = classify(&row(&[("name", "Acme Holdings LLC")]));
        assert_eq!(c.input_signature, InputSignature::CompanyNameOnly);
        assert_eq!(c.entity_type, EntityType::Company);
    }

    #[test]
    fn company_only_field_is_company_name_only() {
        let c = classify(&row(&[("company", "ABC Technologies")]));
        assert_eq!(c.input_signature, InputSignature::CompanyNameOnly);
        assert_eq!(c.ambiguity_risk, AmbiguityRisk::High);
        assert_eq!(c.required_fields, vec![crate::fields::COMPANY]);
    }

    #[test]
    fn bare_person_name_is_weak_search() {
        let c = classify(&row(&[("name", "Jane Rivera")]));
        assert_eq!(c.input_signature, InputSignature::PersonNameOnly);
        assert_eq!(c.identity_strength, IdentityStrength::Weak);
        assert_eq!(c.ambiguity_risk, AmbiguityRisk::High);
        assert_eq!(c.strategy, Strategy::SearchAndValidate);
    }

    #[test]
    fn work_email_is_moderate_search() {
        let c = classify(&row(&[("email", "jane@stripe.com")]));
        assert_eq!(c.input_signature, InputSignature::PersonEmail);
        assert_eq!(c.identity_strength, IdentityStrength::Moderate);
        assert_eq!(c.strategy, Strategy::SearchAndValidate);
    }

    #[test]
    fn free_mail_email_is_unknown() {
        let c = classify(&row(&[("email", "jane@gmail.com")]));
        assert_eq!(c.input_signature, InputSignature::Unknown);
        assert_eq!(c.strategy, Strategy::FailFast);
    }

    #[test]
    fn empty_row_fails_fast_with_reason() {
        let c = classify(&row(&[]));
        assert_eq!(c.input_signature, InputSignature::Unknown);
        assert_eq!(c.identity_strength, IdentityStrength::Invalid);
        assert_eq!(c.strategy, Strategy::FailFast);
        assert_eq!(c.sensitivity_level, SensitivityLevel::Restricted);
        assert_eq!(c.fail_reason.as_deref(), Some("No existing data in row"));
    }

    #[test]
    fn malformed_linkedin_slug_falls_through() {
        // All-digit slug is rejected, and with nothing else the row is unknown.
        let c = classify(&row(&[("linkedin_url", "https://linkedin.com/in/12345")]));
        assert_eq!(c.input_signature, InputSignature::Unknown);
        assert_eq!(c.strategy, Strategy::FailFast);
    }

    #[test]
    fn classification_is_deterministic() {
        let input = row(&[("name", "Karri Saarinen"), ("company", "Linear")]);
        let a = classify(&input);
        let b = classify(&input);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn sensitivity_matrix_extremes() {
        assert_eq!(
            sensitivity_for(IdentityStrength::Strong, AmbiguityRisk::Low),
            SensitivityLevel::Public
        );
        assert_eq!(
            sensitivity_for(IdentityStrength::Invalid, AmbiguityRisk::High),
            SensitivityLevel::Restricted
        );
    }

    #[test]
    fn private_sensitivity_withholds_contact_fields() {
        assert!(!field_allowed(SensitivityLevel::Private, crate::fields::WORK_EMAIL));
        assert!(field_allowed(SensitivityLevel::Private, crate::fields::DOMAIN));
        assert!(field_allowed(SensitivityLevel::Public, crate::fields::WORK_EMAIL));
        assert!(!field_allowed(SensitivityLevel::Restricted, crate::fields::DOMAIN));
    }

    #[test]
    fn domain_plus_name_prefers_name_signatures() {
        let c = classify(&row(&[("name", "Stripe"), ("domain", "stripe.com")]));
        // Rule 3 requires name to be absent; the company-shaped name wins.
        assert_eq!(c.input_signature, InputSignature::CompanyNameOnly);
    }
}
