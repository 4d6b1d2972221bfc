//! Classifier throughput benchmark.
//!
//! The classifier runs once per enrichment request; it must stay cheap
//! enough to be negligible next to any provider call.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use rowbot_core::classify::classify;
use rowbot_core::fields::NormalizedInput;

fn input_of(pairs: &[(&str, &str)]) -> NormalizedInput {
    let map: BTreeMap<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), json!(v)))
        .collect();
    NormalizedInput::from_row("bench-row", &map)
}

fn bench_classify(c: &mut Criterion) {
    let person = input_of(&[("name", "Karri Saarinen"), ("company", "Linear")]);
    let company = input_of(&[("name", "Stripe")]);
    let domain = input_of(&[("domain", "stripe.com")]);
    let linkedin = input_of(&[("linkedin_url", "https://linkedin.com/in/karrisaarinen")]);
    let ambiguous = input_of(&[("name", "John Smith"), ("company", "Google")]);

    c.bench_function("classify_person_name_company", |b| {
        b.iter(|| classify(black_box(&person)))
    });
    c.bench_function("classify_company_name_only", |b| {
        b.iter(|| classify(black_box(&company)))
    });
    c.bench_function("classify_company_domain", |b| {
        b.iter(|| classify(black_box(&domain)))
    });
    c.bench_function("classify_linkedin_url", |b| {
        b.iter(|| classify(black_box(&linkedin)))
    });
    c.bench_function("classify_ambiguous_person", |b| {
        b.iter(|| classify(black_box(&ambiguous)))
    });
}

fn bench_normalization(c: &mut Criterion) {
    c.bench_function("normalize_row", |b| {
        let row: BTreeMap<String, serde_json::Value> = BTreeMap::from([
            ("company_name".to_string(), json!("Stripe, Inc.")),
            ("Website".to_string(), json!("https://www.stripe.com/about")),
            ("linkedin_url".to_string(), json!("linkedin.com/in/patrick")),
        ]);
        b.iter(|| NormalizedInput::from_row(black_box("bench-row"), black_box(&row)))
    });
}

criterion_group!(benches, bench_classify, bench_normalization);
criterion_main!(benches);
