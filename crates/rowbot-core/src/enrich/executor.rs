//! Step-by-step plan execution.
//!
//! Steps run serially; each step's outputs are visible to the next. The
//! executor merges non-null fields, short-circuits once the target is
//! satisfied confidently, switches to the fallback plan when a required
//! step fails, and stops launching steps past the caller's deadline.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, ToolError};
use crate::fields::{self, NormalizedInput, OutputMap};
use crate::planner::{WorkflowPlan, WorkflowStep};
use crate::registry::ToolRegistry;
use crate::service::Services;

/// Slack under the plan's expected confidence that still short-circuits.
const SHORT_CIRCUIT_SLACK: f64 = 0.2;

/// How one executed (or skipped) step went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDiagnostic {
    /// Tool id.
    pub tool_id: String,
    /// `ok`, `empty`, `failed`, `skipped`, or `circuit_open`.
    pub outcome: String,
    /// Wall-clock time spent in the tool, milliseconds.
    pub elapsed_ms: u64,
    /// Tool-level reason, when one was reported.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Why plan execution stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanOutcome {
    /// Every step ran (or was skipped) to the end.
    Completed,
    /// The target field was satisfied early.
    ShortCircuited,
    /// A required provider's breaker refused with no fallback left.
    CircuitOpen {
        /// The refusing provider.
        provider: String,
        /// Milliseconds until a trial request is allowed.
        retry_in_ms: u64,
    },
    /// The deadline (or caller cancellation) stopped further steps.
    DeadlinePartial,
}

/// Execution result handed back to the service layer.
pub struct Execution {
    /// Accumulated outputs, metadata included.
    pub outputs: OutputMap,
    /// Per-step diagnostics.
    pub steps: Vec<StepDiagnostic>,
    /// Why execution stopped.
    pub outcome: PlanOutcome,
}

/// Walk a plan step by step.
pub async fn run_plan(
    services: &Services,
    registry: &ToolRegistry,
    plan: &WorkflowPlan,
    input: &NormalizedInput,
    target_field: Option<&str>,
    deadline_ms: Option<u64>,
    cancel: &CancellationToken,
) -> Execution {
    let deadline = deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut acc = OutputMap::new();
    let mut diagnostics = Vec::new();

    let mut queue: Vec<&WorkflowStep> = plan.steps.iter().collect();
    let mut fallback_available = !plan.fallback_plan.is_empty();
    let mut index = 0;

    while index < queue.len() {
        let step = queue[index];
        index += 1;

        if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::debug!(tool = step.tool_id, "deadline reached, stopping plan");
            return Execution {
                outputs: acc,
                steps: diagnostics,
                outcome: PlanOutcome::DeadlinePartial,
            };
        }

        if !services.config.tools.is_enabled(step.tool_id) {
            diagnostics.push(StepDiagnostic {
                tool_id: step.tool_id.to_string(),
                outcome: "skipped".to_string(),
                elapsed_ms: 0,
                reason: Some("disabled by configuration".to_string()),
            });
            if step.can_fail {
                continue;
            }
            if switch_to_fallback(plan, &mut queue, &mut index, &mut fallback_available) {
                continue;
            }
            break;
        }

        let Some(entry) = registry.get(step.tool_id) else {
            diagnostics.push(StepDiagnostic {
                tool_id: step.tool_id.to_string(),
                outcome: "failed".to_string(),
                elapsed_ms: 0,
                reason: Some("tool not in registry".to_string()),
            });
            continue;
        };

        let started = Instant::now();
        let result = entry.executor.execute(services, input, &acc).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(outputs) => {
                let reason = outputs
                    .get("_reason")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let step_confidence = outputs.get("_confidence").and_then(Value::as_f64);
                let empty = outputs
                    .iter()
                    .all(|(k, v)| fields::is_meta_key(k) || v.is_null());

                merge(&mut acc, outputs);

                if empty {
                    diagnostics.push(StepDiagnostic {
                        tool_id: step.tool_id.to_string(),
                        outcome: "empty".to_string(),
                        elapsed_ms,
                        reason,
                    });
                    if !step.can_fail {
                        if switch_to_fallback(
                            plan,
                            &mut queue,
                            &mut index,
                            &mut fallback_available,
                        ) {
                            continue;
                        }
                        break;
                    }
                    continue;
                }

                diagnostics.push(StepDiagnostic {
                    tool_id: step.tool_id.to_string(),
                    outcome: "ok".to_string(),
                    elapsed_ms,
                    reason,
                });

                // Short-circuit once the target is confidently satisfied.
                if let Some(target) = target_field {
                    let satisfied = acc.get(target).map(fields::is_non_empty).unwrap_or(false);
                    let confident = step_confidence
                        .map(|c| c >= plan.expected_confidence - SHORT_CIRCUIT_SLACK)
                        .unwrap_or(true);
                    if satisfied && confident {
                        tracing::debug!(
                            tool = step.tool_id,
                            target,
                            "target satisfied, short-circuiting plan",
                        );
                        return Execution {
                            outputs: acc,
                            steps: diagnostics,
                            outcome: PlanOutcome::ShortCircuited,
                        };
                    }
                }
            }
            Err(ToolError::Provider {
                source:
                    ProviderError::CircuitOpen {
                        provider,
                        retry_in_ms,
                    },
                ..
            }) => {
                diagnostics.push(StepDiagnostic {
                    tool_id: step.tool_id.to_string(),
                    outcome: "circuit_open".to_string(),
                    elapsed_ms,
                    reason: Some(format!("breaker open for '{provider}'")),
                });
                if step.can_fail {
                    continue;
                }
                // A refused required step aborts the plan surfaced; the
                // fallback would hit the same open breaker.
                return Execution {
                    outputs: acc,
                    steps: diagnostics,
                    outcome: PlanOutcome::CircuitOpen {
                        provider,
                        retry_in_ms,
                    },
                };
            }
            Err(error) => {
                tracing::debug!(tool = step.tool_id, error = %error, "step failed");
                diagnostics.push(StepDiagnostic {
                    tool_id: step.tool_id.to_string(),
                    outcome: "failed".to_string(),
                    elapsed_ms,
                    reason: Some(error.to_string()),
                });
                if step.can_fail {
                    continue;
                }
                if switch_to_fallback(plan, &mut queue, &mut index, &mut fallback_available) {
                    continue;
                }
                break;
            }
        }
    }

    Execution {
        outputs: acc,
        steps: diagnostics,
        outcome: PlanOutcome::Completed,
    }
}

/// Abandon the remaining primary steps and continue with the fallback
/// plan. Returns false when no fallback remains.
fn switch_to_fallback<'a>(
    plan: &'a WorkflowPlan,
    queue: &mut Vec<&'a WorkflowStep>,
    index: &mut usize,
    fallback_available: &mut bool,
) -> bool {
    if !*fallback_available {
        return false;
    }
    *fallback_available = false;
    tracing::debug!("switching to fallback plan");
    *queue = plan.fallback_plan.iter().collect();
    *index = 0;
    true
}

/// Merge step outputs: non-null fields land (later refinements may
/// overwrite), nulls never erase earlier values, metadata always updates.
fn merge(acc: &mut OutputMap, outputs: OutputMap) {
    for (key, value) in outputs {
        if fields::is_meta_key(&key) {
            acc.insert(key, value);
        } else if !value.is_null() {
            acc.insert(key, value);
        } else {
            acc.entry(key).or_insert(Value::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_existing_over_null() {
        let mut acc = OutputMap::new();
        acc.insert("domain".to_string(), json!("stripe.com"));
        let mut step = OutputMap::new();
        step.insert("domain".to_string(), Value::Null);
        step.insert("industry".to_string(), json!("fintech"));
        merge(&mut acc, step);
        assert_eq!(acc["domain"], json!("stripe.com"));
        assert_eq!(acc["industry"], json!("fintech"));
    }

    #[test]
    fn merge_metadata_always_updates() {
        let mut acc = OutputMap::new();
        acc.insert("_confidence".to_string(), json!(0.4));
        let mut step = OutputMap::new();
        step.insert("_confidence".to_string(), json!(0.9));
        merge(&mut acc, step);
        assert_eq!(acc["_confidence"], json!(0.9));
    }
}
