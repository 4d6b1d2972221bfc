//! Super-agent: turns a classification plus available fields and a target
//! field into an ordered, field-capable workflow plan.
//!
//! Planning is a pure static computation over the registry's field graph:
//! no reflection, no I/O. If a plan is returned and a target field was
//! requested, the union of step outputs is guaranteed to contain it.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::classify::{AmbiguityRisk, ClassificationResult, IdentityStrength, Strategy};
use crate::fields::NormalizedInput;
use crate::registry::{ToolEntry, ToolRegistry};

/// One planned step.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    /// 1-based position in the plan.
    pub step_number: u32,
    /// Tool to run.
    pub tool_id: &'static str,
    /// Input fields that must be present when the step starts.
    pub depends_on: Vec<&'static str>,
    /// Fields the step can add.
    pub expected_outputs: Vec<&'static str>,
    /// Whether the executor may skip this step on failure.
    pub can_fail: bool,
    /// Tool to fall back to when this step fails.
    pub fallback_tool_id: Option<&'static str>,
    /// Worst-case cost, cents.
    pub cost_cents: u32,
}

/// A complete plan for one enrichment request.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowPlan {
    /// The classification the plan was built from.
    pub classification: ClassificationResult,
    /// Primary steps, in execution order.
    pub steps: Vec<WorkflowStep>,
    /// Steps to run when the primary sequence fails.
    pub fallback_plan: Vec<WorkflowStep>,
    /// Worst-case total cost, cents.
    pub max_cost_cents: u32,
    /// Expected confidence in [0.10, 0.95].
    pub expected_confidence: f64,
    /// Human-readable plan summary.
    pub summary: String,
}

/// Why no plan could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkflowError {
    /// The input cannot be enriched; no external calls were made.
    InvalidInput {
        /// Why.
        reason: String,
    },
    /// No tool (or tool sequence) can serve the request.
    NotFound {
        /// Diagnostic naming what was looked for.
        reason: String,
    },
    /// Tools producing the target exist but lack inputs.
    MissingInputs {
        /// The requested field.
        target: String,
        /// Inputs that would unlock a producer.
        missing: Vec<String>,
    },
}

/// Generate a workflow plan.
pub fn generate_workflow(
    registry: &ToolRegistry,
    classification: &ClassificationResult,
    input: &NormalizedInput,
    target_field: Option<&str>,
) -> Result<WorkflowPlan, WorkflowError> {
    // 1. Fail-fast classifications never plan.
    if classification.strategy == Strategy::FailFast {
        return Err(WorkflowError::InvalidInput {
            reason: classification
                .fail_reason
                .clone()
                .unwrap_or_else(|| "input classified as fail-fast".to_string()),
        });
    }

    // 2. At least one identifier must be present.
    let available = input.available_fields();
    if available.is_empty() {
        return Err(WorkflowError::InvalidInput {
            reason: "No existing data in row".to_string(),
        });
    }

    // 3. Candidate tools for this entity and strategy.
    let candidates = registry.matching(classification.entity_type, classification.strategy);
    if candidates.is_empty() {
        return Err(WorkflowError::NotFound {
            reason: format!(
                "no tools registered for {:?} with {:?}",
                classification.entity_type, classification.strategy
            ),
        });
    }

    // 4. Primary sequence by strategy.
    let (primary, fallback) = build_sequences(registry, classification, &candidates);

    // 5. Runnable filter over the ordered steps.
    let (mut steps, covered) = runnable_filter(&primary, &available);
    let (fallback_steps, _) = runnable_filter(&fallback, &available);

    // 6. Field capability planning: extend the plan to produce the target.
    if let Some(target) = target_field {
        let target_covered = steps
            .iter()
            .any(|e| e.definition.outputs.contains(&target));
        if !target_covered {
            let extra = plan_for_target(registry, classification, target, &covered)?;
            steps.push(extra);
        }
    }

    if steps.is_empty() {
        return Err(WorkflowError::InvalidInput {
            reason: "no runnable steps for the available fields".to_string(),
        });
    }

    // 7-8. Cost and expected confidence.
    let max_cost_cents = steps.iter().map(|e| e.definition.cost_cents).sum();
    let expected_confidence = expected_confidence(classification, steps.len());

    let summary = format!(
        "{:?}/{:?}: {}",
        classification.entity_type,
        classification.strategy,
        steps
            .iter()
            .map(|e| e.definition.id)
            .collect::<Vec<_>>()
            .join(" -> "),
    );

    Ok(WorkflowPlan {
        classification: classification.clone(),
        steps: to_steps(&steps),
        fallback_plan: to_steps(&fallback_steps),
        max_cost_cents,
        expected_confidence,
        summary,
    })
}

/// Tools whose ids mark them as identity resolution machinery.
fn is_resolution_family(id: &str) -> bool {
    id.contains("resolve") || id.contains("search") || id.contains("find")
}

fn pick<'a>(
    candidates: &[&'a ToolEntry],
    predicate: impl Fn(&str) -> bool,
) -> Option<&'a ToolEntry> {
    candidates
        .iter()
        .find(|e| predicate(e.definition.id))
        .copied()
}

fn build_sequences<'a>(
    registry: &'a ToolRegistry,
    classification: &ClassificationResult,
    candidates: &[&'a ToolEntry],
) -> (Vec<&'a ToolEntry>, Vec<&'a ToolEntry>) {
    let resolution = pick(candidates, |id| id.contains("resolve"))
        .or_else(|| pick(candidates, |id| id.contains("search")))
        .or_else(|| pick(candidates, |id| id.contains("find")));
    let profile = pick(candidates, |id| {
        id.contains("profile") && !is_resolution_family(id)
    });
    let search = pick(candidates, |id| id.contains("search"));

    match classification.strategy {
        Strategy::DirectLookup => {
            // Top-priority tool only; its declared fallback forms the
            // fallback plan.
            let top = candidates[0];
            let fallback = top
                .definition
                .fallback_tool_id
                .and_then(|id| registry.get(id))
                .map(|e| vec![e])
                .unwrap_or_default();
            (vec![top], fallback)
        }
        Strategy::HypothesisAndScore => {
            let mut primary = Vec::new();
            if let Some(resolution) = resolution {
                primary.push(resolution);
            }
            if let Some(profile) = profile {
                primary.push(profile);
            }
            let fallback = search
                .filter(|s| !primary.iter().any(|p| p.definition.id == s.definition.id))
                .map(|s| vec![s])
                .unwrap_or_default();
            (primary, fallback)
        }
        Strategy::SearchAndValidate => {
            let mut primary = Vec::new();
            if let Some(search) = search {
                primary.push(search);
            }
            if let Some(resolution) =
                resolution.filter(|r| !primary.iter().any(|p| p.definition.id == r.definition.id))
            {
                primary.push(resolution);
            }
            if let Some(profile) = profile {
                primary.push(profile);
            }
            (primary, Vec::new())
        }
        Strategy::FailFast => (Vec::new(), Vec::new()),
    }
}

/// Keep only steps whose required inputs are covered, unioning each
/// survivor's outputs into the running availability set.
fn runnable_filter<'a>(
    sequence: &[&'a ToolEntry],
    available: &BTreeSet<&'static str>,
) -> (Vec<&'a ToolEntry>, BTreeSet<&'static str>) {
    let mut covered = available.clone();
    let mut surviving = Vec::new();
    for entry in sequence {
        let check = ToolRegistry::can_run(&entry.definition, &covered);
        if check.can_run {
            covered.extend(entry.definition.outputs.iter().copied());
            surviving.push(*entry);
        } else {
            tracing::debug!(
                tool = entry.definition.id,
                missing = ?check.missing,
                "step dropped by runnable filter",
            );
        }
    }
    (surviving, covered)
}

/// Find one more tool that produces `target` given everything the plan
/// will have made available.
fn plan_for_target<'a>(
    registry: &'a ToolRegistry,
    classification: &ClassificationResult,
    target: &str,
    covered: &BTreeSet<&'static str>,
) -> Result<&'a ToolEntry, WorkflowError> {
    let producers: Vec<&ToolEntry> = registry
        .for_output(target)
        .into_iter()
        .filter(|e| {
            e.definition
                .entity_types
                .contains(&classification.entity_type)
        })
        .collect();

    if producers.is_empty() {
        return Err(WorkflowError::NotFound {
            reason: format!(
                "no {:?} tool produces field '{target}'",
                classification.entity_type
            ),
        });
    }

    if let Some(best) = producers
        .iter()
        .find(|e| ToolRegistry::can_run(&e.definition, covered).can_run)
    {
        return Ok(best);
    }

    // Some producer exists but none can run: name what is missing.
    let missing: Vec<String> = producers
        .first()
        .map(|e| {
            ToolRegistry::can_run(&e.definition, covered)
                .missing
                .into_iter()
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Err(WorkflowError::MissingInputs {
        target: target.to_string(),
        missing,
    })
}

fn to_steps(entries: &[&ToolEntry]) -> Vec<WorkflowStep> {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| WorkflowStep {
            step_number: (i + 1) as u32,
            tool_id: e.definition.id,
            depends_on: e.definition.required_inputs.to_vec(),
            expected_outputs: e.definition.outputs.to_vec(),
            can_fail: e.definition.can_fail,
            fallback_tool_id: e.definition.fallback_tool_id,
            cost_cents: e.definition.cost_cents,
        })
        .collect()
}

/// Base 0.5, identity and ambiguity adjustments, small per-step bonus,
/// clamped to [0.10, 0.95].
fn expected_confidence(classification: &ClassificationResult, step_count: usize) -> f64 {
    let mut confidence: f64 = 0.5;
    confidence += match classification.identity_strength {
        IdentityStrength::Strong => 0.30,
        IdentityStrength::Moderate => 0.15,
        IdentityStrength::Weak => 0.05,
        IdentityStrength::Invalid => 0.0,
    };
    confidence += match classification.ambiguity_risk {
        AmbiguityRisk::Low => 0.10,
        AmbiguityRisk::Medium => 0.0,
        AmbiguityRisk::High => -0.15,
    };
    confidence += (0.05 * step_count as f64).min(0.15);
    confidence.clamp(0.10, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::fields;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn input_of(pairs: &[(&str, &str)]) -> NormalizedInput {
        let map: BTreeMap<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), json!(v)))
            .collect();
        NormalizedInput::from_row("r1", &map)
    }

    fn plan_for(
        pairs: &[(&str, &str)],
        target: Option<&str>,
    ) -> Result<WorkflowPlan, WorkflowError> {
        let registry = ToolRegistry::standard();
        let input = input_of(pairs);
        let classification = classify(&input);
        generate_workflow(&registry, &classification, &input, target)
    }

    /// Re-derives the availability invariant for a generated plan.
    fn assert_step_inputs_covered(plan: &WorkflowPlan, input: &NormalizedInput) {
        let mut available: BTreeSet<&str> =
            input.available_fields().into_iter().collect();
        for step in &plan.steps {
            for required in &step.depends_on {
                assert!(
                    available.contains(required),
                    "step {} requires unavailable '{}'",
                    step.tool_id,
                    required
                );
            }
            available.extend(step.expected_outputs.iter().copied());
        }
    }

    #[test]
    fn company_name_plan_resolves_then_profiles() {
        let plan = plan_for(&[("company", "Stripe")], Some(fields::DOMAIN)).expect("plan");
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.tool_id).collect();
        assert_eq!(ids[0], "resolve_company_from_name");
        // The target (domain) is produced by step 1; the profile step was
        // dropped by the runnable filter only if domain was unavailable --
        // here it survives because the resolver advertises domain.
        assert!(plan
            .steps
            .iter()
            .any(|s| s.expected_outputs.contains(&fields::DOMAIN)));
        assert_eq!(plan.fallback_plan[0].tool_id, "search_company_web");
    }

    #[test]
    fn domain_row_with_industry_target_extends_plan() {
        let plan = plan_for(&[("domain", "stripe.com")], Some(fields::INDUSTRY)).expect("plan");
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.tool_id).collect();
        assert_eq!(ids[0], "resolve_company_from_domain");
        assert!(ids.contains(&"fetch_company_profile"));
        let input = input_of(&[("domain", "stripe.com")]);
        assert_step_inputs_covered(&plan, &input);
    }

    #[test]
    fn person_name_company_plan_anchors_identity() {
        let plan = plan_for(
            &[("name", "Karri Saarinen"), ("company", "Linear")],
            Some(fields::LINKEDIN_URL),
        )
        .expect("plan");
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.tool_id).collect();
        assert_eq!(ids[0], "resolve_person_from_name");
        assert!(plan
            .steps
            .iter()
            .any(|s| s.expected_outputs.contains(&fields::LINKEDIN_URL)));
    }

    #[test]
    fn person_linkedin_url_is_direct_lookup() {
        let plan = plan_for(
            &[
                ("name", "Karri Saarinen"),
                ("company", "Linear"),
                ("linkedin_url", "https://linkedin.com/in/karrisaarinen"),
            ],
            None,
        )
        .expect("plan");
        assert_eq!(plan.steps[0].tool_id, "resolve_person_from_linkedin");
        assert_eq!(plan.fallback_plan[0].tool_id, "search_person_web");
    }

    #[test]
    fn unrunnable_fallback_is_filtered_out() {
        // With only a LinkedIn URL, the name-requiring search fallback
        // cannot run and is dropped.
        let plan = plan_for(
            &[("linkedin_url", "https://linkedin.com/in/karrisaarinen")],
            None,
        )
        .expect("plan");
        assert_eq!(plan.steps[0].tool_id, "resolve_person_from_linkedin");
        assert!(plan.fallback_plan.is_empty());
    }

    #[test]
    fn empty_row_is_invalid_input() {
        let err = plan_for(&[], Some(fields::DOMAIN)).unwrap_err();
        match err {
            WorkflowError::InvalidInput { reason } => {
                assert_eq!(reason, "No existing data in row");
            }
            other => panic!("expected InvalidInput, got: {other:?}"),
        }
    }

    #[test]
    fn unreachable_target_names_missing_inputs() {
        // Person row without a domain: the work-email producer exists but
        // cannot run, and nothing else emits workEmail.
        let plan = plan_for(&[("name", "Jane Rivera")], Some(fields::WORK_EMAIL));
        match plan.unwrap_err() {
            WorkflowError::MissingInputs { target, missing } => {
                assert_eq!(target, fields::WORK_EMAIL);
                assert!(missing.contains(&fields::DOMAIN.to_string()));
            }
            other => panic!("expected MissingInputs, got: {other:?}"),
        }
    }

    #[test]
    fn target_unknown_to_entity_is_not_found() {
        // Company rows have no bio producer.
        let err = plan_for(&[("domain", "stripe.com")], Some(fields::BIO)).unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }

    #[test]
    fn plan_guarantees_target_in_union_of_outputs() {
        for (pairs, target) in [
            (vec![("company", "Stripe")], fields::DOMAIN),
            (vec![("domain", "stripe.com")], fields::INDUSTRY),
            (vec![("domain", "stripe.com")], fields::EMPLOYEE_COUNT_RANGE),
            (
                vec![("name", "Karri Saarinen"), ("company", "Linear")],
                fields::LINKEDIN_URL,
            ),
        ] {
            let plan = plan_for(&pairs, Some(target)).expect("plan");
            let union: BTreeSet<&str> = plan
                .steps
                .iter()
                .flat_map(|s| s.expected_outputs.iter().copied())
                .collect();
            assert!(union.contains(target), "target {target} not covered");
        }
    }

    #[test]
    fn every_plan_satisfies_availability_invariant() {
        for pairs in [
            vec![("company", "Stripe")],
            vec![("domain", "linear.app")],
            vec![("name", "Karri Saarinen"), ("company", "Linear")],
            vec![("name", "Jane Rivera")],
        ] {
            let input = input_of(&pairs);
            let classification = classify(&input);
            let registry = ToolRegistry::standard();
            if let Ok(plan) = generate_workflow(&registry, &classification, &input, None) {
                assert_step_inputs_covered(&plan, &input);
            }
        }
    }

    #[test]
    fn expected_confidence_bounds() {
        let strong = plan_for(&[("domain", "stripe.com")], None).expect("plan");
        assert!(strong.expected_confidence >= 0.10);
        assert!(strong.expected_confidence <= 0.95);
        // Strong identity + low ambiguity: 0.5 + 0.3 + 0.1 + step bonus.
        assert!(strong.expected_confidence >= 0.90);

        let weak = plan_for(&[("name", "Jane Rivera")], None).expect("plan");
        assert!(weak.expected_confidence < strong.expected_confidence);
    }

    #[test]
    fn max_cost_is_sum_of_step_costs() {
        let plan = plan_for(&[("domain", "stripe.com")], Some(fields::INDUSTRY)).expect("plan");
        let sum: u32 = plan.steps.iter().map(|s| s.cost_cents).sum();
        assert_eq!(plan.max_cost_cents, sum);
    }

    #[test]
    fn fail_fast_classification_never_plans() {
        let err = plan_for(&[("email", "jane@gmail.com")], None).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput { .. }));
    }
}
