//! End-to-end scenarios over the full pipeline with fake providers:
//! classify → plan → execute → assemble, exactly as the job runner sees it.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::{EnrichRequest, EnrichService, EnrichState};
use crate::breaker::CircuitState;
use crate::fields;
use crate::testkit::{fake_services, hit, organic, FakeExtractor, FakePages, FakeSearch};

fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect()
}

fn request(pairs: &[(&str, &str)], target: &str) -> EnrichRequest {
    EnrichRequest {
        row_id: "row-1".to_string(),
        existing_data: row(pairs),
        target_field: Some(target.to_string()),
        deadline_ms: None,
    }
}

fn stripe_search() -> FakeSearch {
    FakeSearch::new().on(
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
    )
}

#[tokio::test]
async fn scenario_1_company_name_to_domain() {
    let search = Arc::new(stripe_search());
    let services = Arc::new(fake_services(Some(search), None, None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let response = enricher
        .enrich(request(&[("name", "Stripe")], fields::DOMAIN))
        .await;

    assert_eq!(response.state, EnrichState::Ok);
    assert_eq!(response.outputs[fields::DOMAIN], json!("stripe.com"));
    let confidence = response.outputs["_confidence"].as_f64().unwrap();
    assert!(
        (0.90..=0.95).contains(&confidence),
        "got {confidence}"
    );
}

#[tokio::test]
async fn scenario_2_generic_word_company_resolves_medium() {
    let search = Arc::new(FakeSearch::new().on(
        "Linear official website",
        organic(vec![
            hit(
                1,
                "Linear — Plan and build products",
                "https://linear.app/",
                "Linear streamlines issues, projects and roadmaps. Source on GitHub and LinkedIn.",
            ),
            hit(
                2,
                "Linear | Measurement Tools",
                "https://linear-tools.com/",
                "Linear measurement tools for contractors, catalog on GitHub for integrators.",
            ),
        ]),
    ));
    let services = Arc::new(fake_services(Some(search), None, None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let response = enricher
        .enrich(request(&[("name", "Linear")], fields::DOMAIN))
        .await;

    assert_eq!(response.state, EnrichState::Ok);
    assert_eq!(response.outputs[fields::DOMAIN], json!("linear.app"));
    let confidence = response.outputs["_confidence"].as_f64().unwrap();
    assert!(
        (0.65..=0.85).contains(&confidence),
        "close competitors must land in the medium band, got {confidence}"
    );
}

#[tokio::test]
async fn scenario_3_generic_company_name_is_not_found() {
    let search = Arc::new(FakeSearch::new().on(
        "ABC Technologies official website",
        organic(vec![
            hit(1, "ABC Tech Solutions", "https://abctechsolutions.example.com/", "IT services."),
            hit(2, "ABC Tech Services", "https://abctech.example.org/", "Tech services co."),
            hit(3, "ABC Global", "https://abcglobal.example.net/", "Global group."),
        ]),
    ));
    let services = Arc::new(fake_services(Some(search), None, None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let response = enricher
        .enrich(request(&[("company", "ABC Technologies")], fields::DOMAIN))
        .await;

    assert_eq!(response.state, EnrichState::NotFound);
    let reason = response.reason.expect("reason");
    assert!(
        reason.contains("Generic company name"),
        "reason was: {reason}"
    );
}

#[tokio::test]
async fn scenario_4_domain_row_extends_plan_to_industry() {
    let homepage = r#"<html><head>
        <title>Stripe | Financial infrastructure</title>
        <meta name="description" content="Payments infrastructure for the internet.">
    </head><body></body></html>"#;
    let pages = Arc::new(FakePages::new().on("stripe.com", homepage));
    let extractor = Arc::new(FakeExtractor::new().on(
        "Homepage title",
        json!({
            "description": "Payments infrastructure for the internet.",
            "industry": "Financial technology",
            "founded": "2010",
            "location": "San Francisco, CA",
            "confidence": 0.85
        }),
    ));
    let services = Arc::new(fake_services(None, Some(extractor), Some(pages), None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let response = enricher
        .enrich(request(&[("domain", "stripe.com")], fields::INDUSTRY))
        .await;

    assert_eq!(response.state, EnrichState::Ok);
    assert_eq!(
        response.outputs[fields::INDUSTRY],
        json!("Financial technology")
    );
    // The plan was extended with the profile tool to reach the target.
    let summary = response.diagnostics.plan_summary.unwrap();
    assert!(summary.contains("fetch_company_profile"), "{summary}");
}

#[tokio::test]
async fn scenario_5_person_resolves_linkedin_url() {
    let profile_hits = organic(vec![hit(
        1,
        "Karri Saarinen - CEO - Linear | LinkedIn",
        "https://linkedin.com/in/karrisaarinen",
        "Karri Saarinen. CEO and co-founder of Linear. San Francisco Bay Area.",
    )]);
    let search = Arc::new(
        FakeSearch::new()
            .on("\"Karri Saarinen\" \"Linear\" site:linkedin.com/in", profile_hits.clone())
            .on("site:linkedin.com/in \"karrisaarinen\"", profile_hits),
    );
    let extractor = Arc::new(
        FakeExtractor::new()
            .on(
                "Candidates:",
                json!({
                    "selectedUrl": "https://linkedin.com/in/karrisaarinen",
                    "nameMatch": true,
                    "companyMatch": true,
                    "titlePresent": true,
                    "confidence": 0.9,
                    "reason": null
                }),
            )
            .on(
                "Results:",
                json!({
                    "name": "Karri Saarinen",
                    "title": "CEO",
                    "company": "Linear",
                    "location": "San Francisco Bay Area",
                    "confidence": 0.8
                }),
            ),
    );
    let services = Arc::new(fake_services(Some(search), Some(extractor), None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let response = enricher
        .enrich(request(
            &[("name", "Karri Saarinen"), ("company", "Linear")],
            fields::LINKEDIN_URL,
        ))
        .await;

    assert_eq!(response.state, EnrichState::Ok);
    assert_eq!(
        response.outputs[fields::LINKEDIN_URL],
        json!("https://linkedin.com/in/karrisaarinen")
    );
    let confidence = response.outputs["_confidence"].as_f64().unwrap();
    assert!(confidence >= 0.70, "got {confidence}");
}

#[tokio::test]
async fn scenario_6_empty_row_is_invalid_input() {
    let services = Arc::new(fake_services(None, None, None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let response = enricher.enrich(request(&[], "anything")).await;

    assert_eq!(response.state, EnrichState::InvalidInput);
    assert_eq!(response.reason.as_deref(), Some("No existing data in row"));
    // Fail-fast: zero steps, zero provider traffic.
    assert!(response.diagnostics.steps.is_empty());
}

#[tokio::test]
async fn scenario_7_warm_cache_survives_open_breaker() {
    let search = Arc::new(stripe_search());
    let services = Arc::new(fake_services(Some(Arc::clone(&search)), None, None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let cold = enricher
        .enrich(request(&[("name", "Stripe")], fields::DOMAIN))
        .await;
    assert_eq!(cold.state, EnrichState::Ok);
    let calls_after_cold = search.call_count();
    assert!(calls_after_cold >= 1);

    // The search provider melts down.
    services
        .breakers
        .force_state(crate::service::PROVIDER_SEARCH, CircuitState::Open);

    let warm = enricher
        .enrich(request(&[("name", "Stripe")], fields::DOMAIN))
        .await;

    assert_eq!(warm.state, EnrichState::Ok);
    // Served entirely from cache: zero further provider calls.
    assert_eq!(search.call_count(), calls_after_cold);
    // Byte-identical outputs.
    assert_eq!(
        serde_json::to_string(&cold.outputs).unwrap(),
        serde_json::to_string(&warm.outputs).unwrap()
    );
    // The breaker saw no traffic and stayed open.
    assert_eq!(
        services.breakers.get(crate::service::PROVIDER_SEARCH).state(),
        CircuitState::Open
    );
}

#[tokio::test]
async fn open_breaker_with_cold_cache_surfaces_circuit_open() {
    let search = Arc::new(stripe_search());
    let services = Arc::new(fake_services(Some(search), None, None, None).await);
    services
        .breakers
        .force_state(crate::service::PROVIDER_SEARCH, CircuitState::Open);
    let enricher = EnrichService::new(Arc::clone(&services));

    let response = enricher
        .enrich(request(&[("name", "Stripe")], fields::DOMAIN))
        .await;

    // The resolver cannot run, the search fallback hits the same open
    // breaker, and the error surfaces as CIRCUIT_OPEN.
    assert_eq!(response.state, EnrichState::CircuitOpen);
    let reason = response.reason.expect("reason");
    assert!(reason.contains("serper"), "{reason}");
}

#[tokio::test]
async fn deadline_zero_returns_before_any_step() {
    let search = Arc::new(stripe_search());
    let services = Arc::new(fake_services(Some(Arc::clone(&search)), None, None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let mut req = request(&[("name", "Stripe")], fields::DOMAIN);
    req.deadline_ms = Some(0);
    let response = enricher.enrich(req).await;

    assert_eq!(response.state, EnrichState::NotFound);
    assert_eq!(search.call_count(), 0);
}

#[tokio::test]
async fn disabled_tool_is_skipped() {
    let search = Arc::new(stripe_search());
    let mut services = fake_services(Some(Arc::clone(&search)), None, None, None).await;
    services
        .config
        .tools
        .enabled
        .insert("resolve_company_from_name".to_string(), false);
    let enricher = EnrichService::new(Arc::new(services));

    let response = enricher
        .enrich(request(&[("name", "Stripe")], fields::DOMAIN))
        .await;

    // The resolver is disabled and its search fallback produces no domain.
    assert_ne!(response.state, EnrichState::Ok);
    assert!(response
        .diagnostics
        .steps
        .iter()
        .any(|s| s.tool_id == "resolve_company_from_name" && s.outcome == "skipped"));
}

#[tokio::test]
async fn unimplemented_advertised_tool_is_a_hard_error() {
    let services = Arc::new(fake_services(None, None, None, None).await);
    let enricher = EnrichService::new(Arc::clone(&services));

    let entry = enricher.registry().get("detect_tech_stack").unwrap();
    let input = crate::fields::NormalizedInput {
        row_id: "r1".to_string(),
        domain: Some("stripe.com".to_string()),
        ..Default::default()
    };
    let err = entry
        .executor
        .execute(&services, &input, &crate::fields::OutputMap::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        crate::error::ToolError::NotImplemented { .. }
    ));
}
