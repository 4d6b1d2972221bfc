//! The enrichment entrypoint: the contract the job runner calls.
//!
//! `enrich({rowId, existingData, targetField, deadline}) → {state, outputs,
//! diagnostics}`. One call classifies the row, plans a workflow, executes
//! it step by step, and assembles the cell-level outcome. Concurrent calls
//! for the same `(rowId, targetField)` coalesce to a single execution.

mod executor;

#[cfg(test)]
mod e2e_tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStats;
use crate::classify::{classify, ClassificationResult, EntityType, SensitivityLevel, Strategy};
use crate::error::EnrichError;
use crate::fields::{self, NormalizedInput, OutputMap};
use crate::flight::cell_flight_key;
use crate::planner::{generate_workflow, WorkflowError};
use crate::registry::ToolRegistry;
use crate::service::Services;

pub use executor::{PlanOutcome, StepDiagnostic};

/// One enrichment request from the job runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichRequest {
    /// Row identifier.
    pub row_id: String,
    /// The row's current fields.
    pub existing_data: BTreeMap<String, Value>,
    /// The field the caller wants filled.
    #[serde(default)]
    pub target_field: Option<String>,
    /// Overall deadline for this request, milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// Terminal cell state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrichState {
    /// The target (or at least one field) was produced.
    Ok,
    /// Some fields were produced, but not the target.
    Partial,
    /// The workflow completed with nothing usable.
    NotFound,
    /// The row cannot be enriched; no external calls were made.
    InvalidInput,
    /// A required provider's breaker refused and no fallback existed.
    CircuitOpen,
}

/// Per-request diagnostics for the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// The classifier's one-line summary.
    pub classification: String,
    /// Plan summary (`tool -> tool -> ...`).
    pub plan_summary: Option<String>,
    /// The plan's expected confidence.
    pub expected_confidence: Option<f64>,
    /// Worst-case plan cost, cents.
    pub max_cost_cents: Option<u32>,
    /// Per-step timing and outcome.
    pub steps: Vec<StepDiagnostic>,
    /// Cache counters at response time.
    pub cache: CacheStats,
    /// Machine tag of the terminal error, when the request failed.
    #[serde(default)]
    pub error_kind: Option<String>,
}

/// The enrichment response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichResponse {
    /// Terminal state.
    pub state: EnrichState,
    /// Canonical field names → values, plus `_`-prefixed tool metadata.
    pub outputs: OutputMap,
    /// Human-readable reason, retained for the operator.
    #[serde(default)]
    pub reason: Option<String>,
    /// Per-request diagnostics.
    pub diagnostics: Diagnostics,
}

/// The enrichment service: registry plus shared services.
pub struct EnrichService {
    services: Arc<Services>,
    registry: ToolRegistry,
}

impl EnrichService {
    /// Build the service over shared [`Services`] with the standard
    /// tool catalog.
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            registry: ToolRegistry::standard(),
        }
    }

    /// The tool registry (operator surfaces read it).
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Enrich one cell. Concurrent calls for the same `(rowId, target)`
    /// coalesce to one execution; all callers get the same response.
    pub async fn enrich(&self, request: EnrichRequest) -> EnrichResponse {
        self.enrich_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Enrich with an external cancellation signal from the job runner.
    pub async fn enrich_with_cancel(
        &self,
        request: EnrichRequest,
        cancel: &CancellationToken,
    ) -> EnrichResponse {
        let key = cell_flight_key(
            &request.row_id,
            request.target_field.as_deref().unwrap_or("*"),
        );

        let flight = self
            .services
            .cell_flights
            .run(&key, async {
                let response = self.run(&request, cancel).await;
                match serde_json::to_value(&response) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => Err(crate::flight::FlightFailure::Upstream {
                        message: e.to_string(),
                    }),
                }
            })
            .await;

        match flight {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "coalesced response decode failed, re-running");
                EnrichResponse {
                    state: EnrichState::NotFound,
                    outputs: OutputMap::new(),
                    reason: Some("internal response decode failure".to_string()),
                    diagnostics: Diagnostics::default(),
                }
            }),
            Ok(None) | Err(_) => EnrichResponse {
                state: EnrichState::NotFound,
                outputs: OutputMap::new(),
                reason: Some("coalesced execution failed".to_string()),
                diagnostics: Diagnostics::default(),
            },
        }
    }

    async fn run(&self, request: &EnrichRequest, cancel: &CancellationToken) -> EnrichResponse {
        let input = NormalizedInput::from_row(&request.row_id, &request.existing_data);
        let classification = classify(&input);
        let canonical = canonicalize(&input, &classification);
        let target = request.target_field.as_deref();

        let mut diagnostics = Diagnostics {
            classification: classification.reason.clone(),
            ..Diagnostics::default()
        };

        // Fail-fast rows make no external calls at all.
        if classification.strategy == Strategy::FailFast {
            let error = EnrichError::InvalidInput {
                reason: classification
                    .fail_reason
                    .clone()
                    .unwrap_or_else(|| "input classified as fail-fast".to_string()),
            };
            diagnostics.cache = self.services.cache.stats();
            return failure_response(error, diagnostics);
        }

        let plan = match generate_workflow(&self.registry, &classification, &canonical, target) {
            Ok(plan) => plan,
            Err(error) => {
                diagnostics.cache = self.services.cache.stats();
                let error = match error {
                    WorkflowError::InvalidInput { reason } => EnrichError::InvalidInput { reason },
                    WorkflowError::NotFound { reason } => EnrichError::NotFound { reason },
                    WorkflowError::MissingInputs { target, missing } => EnrichError::InvalidInput {
                        reason: format!(
                            "cannot reach '{target}': missing inputs {}",
                            missing.join(", ")
                        ),
                    },
                };
                return failure_response(error, diagnostics);
            }
        };

        diagnostics.plan_summary = Some(plan.summary.clone());
        diagnostics.expected_confidence = Some(plan.expected_confidence);
        diagnostics.max_cost_cents = Some(plan.max_cost_cents);

        let execution = executor::run_plan(
            &self.services,
            &self.registry,
            &plan,
            &canonical,
            target,
            request.deadline_ms,
            cancel,
        )
        .await;

        diagnostics.steps = execution.steps;
        diagnostics.cache = self.services.cache.stats();

        let mut outputs = execution.outputs;
        apply_sensitivity(&mut outputs, classification.sensitivity_level);

        let last_reason = outputs
            .get("_reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        let target_filled = target
            .map(|t| outputs.get(t).map(fields::is_non_empty).unwrap_or(false))
            .unwrap_or(false);
        let any_field_filled = outputs
            .iter()
            .any(|(k, v)| !fields::is_meta_key(k) && fields::is_non_empty(v));

        let completed_steps = diagnostics.steps.len();
        let (state, reason, error_kind) = match execution.outcome {
            PlanOutcome::CircuitOpen {
                provider,
                retry_in_ms,
            } => {
                let error = EnrichError::CircuitOpen {
                    provider,
                    retry_in_ms,
                };
                (
                    EnrichState::CircuitOpen,
                    Some(error.reason()),
                    Some(error.kind().to_string()),
                )
            }
            PlanOutcome::DeadlinePartial => {
                let error = EnrichError::Deadline { completed_steps };
                if target.is_some() && target_filled {
                    (EnrichState::Ok, None, None)
                } else if any_field_filled {
                    (
                        EnrichState::Partial,
                        Some(error.reason()),
                        Some("PARTIAL".to_string()),
                    )
                } else {
                    (
                        EnrichState::NotFound,
                        Some(error.reason()),
                        Some(error.kind().to_string()),
                    )
                }
            }
            PlanOutcome::Completed | PlanOutcome::ShortCircuited => match target {
                Some(t) => {
                    if target_filled {
                        (EnrichState::Ok, None, None)
                    } else {
                        let error = EnrichError::NotFound {
                            reason: last_reason
                                .clone()
                                .unwrap_or_else(|| format!("no tool produced '{t}'")),
                        };
                        if any_field_filled {
                            (
                                EnrichState::Partial,
                                Some(error.reason()),
                                Some("PARTIAL".to_string()),
                            )
                        } else {
                            (
                                EnrichState::NotFound,
                                Some(error.reason()),
                                Some(error.kind().to_string()),
                            )
                        }
                    }
                }
                None => {
                    if any_field_filled {
                        (EnrichState::Ok, None, None)
                    } else {
                        let error = EnrichError::NotFound {
                            reason: last_reason
                                .clone()
                                .unwrap_or_else(|| "workflow produced no fields".to_string()),
                        };
                        (
                            EnrichState::NotFound,
                            Some(error.reason()),
                            Some(error.kind().to_string()),
                        )
                    }
                }
            },
        };
        diagnostics.error_kind = error_kind;

        EnrichResponse {
            state,
            outputs,
            reason,
            diagnostics,
        }
    }
}

/// Assemble a terminal-failure response from a typed error.
fn failure_response(error: EnrichError, mut diagnostics: Diagnostics) -> EnrichResponse {
    let state = match &error {
        EnrichError::InvalidInput { .. } => EnrichState::InvalidInput,
        EnrichError::NotFound { .. } => EnrichState::NotFound,
        EnrichError::CircuitOpen { .. } => EnrichState::CircuitOpen,
        EnrichError::Deadline { .. } => EnrichState::NotFound,
    };
    diagnostics.error_kind = Some(error.kind().to_string());
    EnrichResponse {
        state,
        outputs: OutputMap::new(),
        reason: Some(error.reason()),
        diagnostics,
    }
}

/// Canonicalize the input for planning.
///
/// Company-entity rows whose identifying name arrived in `name` expose it
/// as `company` (a company's name IS its company); a non-free-mail email
/// contributes its domain when the row has none.
pub fn canonicalize(
    input: &NormalizedInput,
    classification: &ClassificationResult,
) -> NormalizedInput {
    let mut canonical = input.clone();
    if classification.entity_type == EntityType::Company
        && canonical.company.is_none()
        && canonical.name.is_some()
    {
        canonical.company = canonical.name.clone();
    }
    if canonical.domain.is_none() {
        if let Some(domain) = canonical
            .email
            .as_deref()
            .and_then(fields::email_domain)
            .filter(|d| !crate::classify::data::is_free_mail_domain(d))
        {
            canonical.domain = Some(domain);
        }
    }
    canonical
}

/// Enforce the classification's sensitivity cap on the final outputs.
fn apply_sensitivity(outputs: &mut OutputMap, sensitivity: SensitivityLevel) {
    outputs.retain(|key, _| {
        fields::is_meta_key(key) || crate::classify::field_allowed(sensitivity, key)
    });
    if sensitivity >= SensitivityLevel::Limited {
        if let Some(confidence) = outputs.get_mut("_confidence") {
            if let Some(v) = confidence.as_f64() {
                *confidence = serde_json::json!(v.min(0.90));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalize_promotes_company_name() {
        let mut row = BTreeMap::new();
        row.insert("name".to_string(), json!("Stripe"));
        let input = NormalizedInput::from_row("r1", &row);
        let classification = classify(&input);
        let canonical = canonicalize(&input, &classification);
        assert_eq!(canonical.company.as_deref(), Some("Stripe"));
    }

    #[test]
    fn canonicalize_derives_domain_from_work_email() {
        let mut row = BTreeMap::new();
        row.insert("email".to_string(), json!("jane@stripe.com"));
        let input = NormalizedInput::from_row("r1", &row);
        let classification = classify(&input);
        let canonical = canonicalize(&input, &classification);
        assert_eq!(canonical.domain.as_deref(), Some("stripe.com"));
    }

    #[test]
    fn canonicalize_ignores_free_mail_domain() {
        let mut row = BTreeMap::new();
        row.insert("email".to_string(), json!("jane@gmail.com"));
        row.insert("name".to_string(), json!("Jane Rivera"));
        let input = NormalizedInput::from_row("r1", &row);
        let classification = classify(&input);
        let canonical = canonicalize(&input, &classification);
        assert!(canonical.domain.is_none());
    }

    #[test]
    fn sensitivity_private_strips_contact_fields() {
        let mut outputs = OutputMap::new();
        outputs.insert(fields::WORK_EMAIL.to_string(), json!("x@y.com"));
        outputs.insert(fields::DOMAIN.to_string(), json!("y.com"));
        outputs.insert("_confidence".to_string(), json!(0.8));
        apply_sensitivity(&mut outputs, SensitivityLevel::Private);
        assert!(!outputs.contains_key(fields::WORK_EMAIL));
        assert!(outputs.contains_key(fields::DOMAIN));
    }

    #[test]
    fn sensitivity_limited_caps_confidence() {
        let mut outputs = OutputMap::new();
        outputs.insert("_confidence".to_string(), json!(0.95));
        apply_sensitivity(&mut outputs, SensitivityLevel::Limited);
        assert_eq!(outputs["_confidence"], json!(0.90));
    }

    #[test]
    fn sensitivity_public_leaves_everything() {
        let mut outputs = OutputMap::new();
        outputs.insert(fields::WORK_EMAIL.to_string(), json!("x@y.com"));
        outputs.insert("_confidence".to_string(), json!(0.95));
        apply_sensitivity(&mut outputs, SensitivityLevel::Public);
        assert!(outputs.contains_key(fields::WORK_EMAIL));
        assert_eq!(outputs["_confidence"], json!(0.95));
    }
}
