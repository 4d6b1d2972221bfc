//! Static tool catalog.
//!
//! Append-only: adding a capability means adding an entry, never editing
//! dispatch code. Each entry pairs an immutable [`ToolDefinition`] with its
//! executor. The planner reasons over definitions only; the executor calls
//! through the paired [`Tool`].

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::classify::{EntityType, Strategy};
use crate::fields;
use crate::tools::{self, Tool, UnimplementedTool};

/// Pricing tier for a tool's external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CostTier {
    /// No billable provider call.
    Free,
    /// Search/LLM-priced calls.
    Cheap,
    /// Billed per-lookup (email finder).
    Premium,
}

/// Immutable registry entry describing one tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Stable tool id. Resolution tools contain "resolve" or "search".
    pub id: &'static str,
    /// Strategies this tool can serve.
    pub strategies: &'static [Strategy],
    /// Entity types this tool applies to.
    pub entity_types: &'static [EntityType],
    /// Fields that must be available before the tool can run.
    pub required_inputs: &'static [&'static str],
    /// Fields the tool uses when present.
    pub optional_inputs: &'static [&'static str],
    /// Fields the tool can produce.
    pub outputs: &'static [&'static str],
    /// Worst-case provider cost, cents.
    pub cost_cents: u32,
    /// Pricing tier.
    pub tier: CostTier,
    /// Ordering within a plan; lower runs earlier.
    pub priority: u8,
    /// Whether the executor may skip this tool on failure.
    pub can_fail: bool,
    /// Tool to fall back to when this one fails.
    pub fallback_tool_id: Option<&'static str>,
}

/// A definition paired with its executor.
pub struct ToolEntry {
    /// The immutable definition.
    pub definition: ToolDefinition,
    /// The behavior.
    pub executor: Arc<dyn Tool>,
}

/// Result of a runnability check.
#[derive(Debug, Clone)]
pub struct CanRun {
    /// Whether every required input is available.
    pub can_run: bool,
    /// Required inputs that are missing.
    pub missing: Vec<&'static str>,
}

/// The static tool catalog.
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
}

impl ToolRegistry {
    /// The standard catalog with every shipped tool.
    pub fn standard() -> Self {
        use crate::classify::EntityType::{Company, Person};
        use crate::classify::Strategy::{DirectLookup, HypothesisAndScore, SearchAndValidate};

        let entries = vec![
            // ── Company identity ────────────────────────────────────
            ToolEntry {
                definition: ToolDefinition {
                    id: "resolve_company_from_domain",
                    strategies: &[DirectLookup],
                    entity_types: &[Company],
                    required_inputs: &[fields::DOMAIN],
                    optional_inputs: &[],
                    outputs: &[fields::COMPANY, fields::DOMAIN, fields::WEBSITE],
                    cost_cents: 0,
                    tier: CostTier::Free,
                    priority: 5,
                    can_fail: false,
                    fallback_tool_id: Some("resolve_company_from_name"),
                },
                executor: Arc::new(tools::company_domain::CompanyDomainResolver),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "resolve_company_from_name",
                    strategies: &[HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Company],
                    required_inputs: &[fields::COMPANY],
                    optional_inputs: &[],
                    outputs: &[
                        fields::CANONICAL_COMPANY_NAME,
                        fields::DOMAIN,
                        fields::WEBSITE,
                    ],
                    cost_cents: 1,
                    tier: CostTier::Cheap,
                    priority: 10,
                    can_fail: false,
                    fallback_tool_id: Some("search_company_web"),
                },
                executor: Arc::new(tools::company_name::CompanyNameResolver),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "search_company_web",
                    strategies: &[HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Company],
                    required_inputs: &[fields::COMPANY],
                    optional_inputs: &[fields::DOMAIN],
                    outputs: &[fields::SEARCH_CONTEXT],
                    cost_cents: 1,
                    tier: CostTier::Cheap,
                    priority: 1,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::company_name::CompanyWebSearch),
            },
            // ── Company decoration ──────────────────────────────────
            ToolEntry {
                definition: ToolDefinition {
                    id: "fetch_company_profile",
                    strategies: &[DirectLookup, HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Company],
                    required_inputs: &[fields::DOMAIN],
                    optional_inputs: &[fields::COMPANY],
                    outputs: &[
                        fields::DESCRIPTION,
                        fields::INDUSTRY,
                        fields::FOUNDED,
                        fields::LOCATION,
                    ],
                    cost_cents: 2,
                    tier: CostTier::Cheap,
                    priority: 20,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::company_profile::CompanyProfileFetcher),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "fetch_company_socials",
                    strategies: &[DirectLookup, HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Company],
                    required_inputs: &[fields::DOMAIN],
                    optional_inputs: &[fields::COMPANY],
                    outputs: &[
                        fields::TWITTER,
                        fields::LINKEDIN,
                        fields::GITHUB,
                        fields::FACEBOOK,
                        fields::INSTAGRAM,
                    ],
                    cost_cents: 0,
                    tier: CostTier::Free,
                    priority: 30,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::company_socials::CompanySocialsFetcher),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "estimate_company_size",
                    strategies: &[DirectLookup, HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Company],
                    required_inputs: &[fields::DOMAIN],
                    optional_inputs: &[fields::COMPANY],
                    outputs: &[
                        fields::EMPLOYEE_COUNT_RANGE,
                        fields::HIRING_STATUS,
                        fields::LINKEDIN_COMPANY_URL,
                        fields::INDUSTRY,
                        fields::LOCATION,
                    ],
                    cost_cents: 2,
                    tier: CostTier::Cheap,
                    priority: 40,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::company_size::CompanySizeEstimator),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "detect_tech_stack",
                    strategies: &[DirectLookup, HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Company],
                    required_inputs: &[fields::DOMAIN],
                    optional_inputs: &[],
                    outputs: &[fields::TECH_STACK],
                    cost_cents: 1,
                    tier: CostTier::Cheap,
                    priority: 90,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(UnimplementedTool {
                    id: "detect_tech_stack",
                }),
            },
            // ── Person identity ─────────────────────────────────────
            ToolEntry {
                definition: ToolDefinition {
                    id: "resolve_person_from_name",
                    strategies: &[HypothesisAndScore],
                    entity_types: &[Person],
                    required_inputs: &[fields::NAME, fields::COMPANY],
                    optional_inputs: &[],
                    outputs: &[
                        fields::NAME,
                        fields::TITLE,
                        fields::COMPANY,
                        fields::LOCATION,
                        fields::LINKEDIN_URL,
                    ],
                    cost_cents: 3,
                    tier: CostTier::Cheap,
                    priority: 8,
                    can_fail: false,
                    fallback_tool_id: Some("search_person_web"),
                },
                executor: Arc::new(tools::person_from_name::PersonFromNameResolver),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "resolve_person_from_linkedin",
                    strategies: &[DirectLookup, SearchAndValidate],
                    entity_types: &[Person],
                    required_inputs: &[],
                    optional_inputs: &[fields::LINKEDIN_URL, fields::NAME, fields::COMPANY],
                    outputs: &[
                        fields::NAME,
                        fields::TITLE,
                        fields::COMPANY,
                        fields::LOCATION,
                        fields::LINKEDIN_URL,
                    ],
                    cost_cents: 2,
                    tier: CostTier::Cheap,
                    priority: 10,
                    can_fail: false,
                    fallback_tool_id: Some("search_person_web"),
                },
                executor: Arc::new(tools::person_resolve::PersonFromLinkedinResolver),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "find_linkedin_profile",
                    strategies: &[HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Person],
                    required_inputs: &[fields::NAME, fields::COMPANY],
                    optional_inputs: &[],
                    outputs: &[fields::LINKEDIN_URL],
                    cost_cents: 2,
                    tier: CostTier::Cheap,
                    priority: 15,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::linkedin_finder::LinkedinProfileFinder),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "search_person_web",
                    strategies: &[SearchAndValidate, HypothesisAndScore],
                    entity_types: &[Person],
                    required_inputs: &[fields::NAME],
                    optional_inputs: &[fields::COMPANY],
                    outputs: &[fields::SEARCH_CONTEXT],
                    cost_cents: 1,
                    tier: CostTier::Cheap,
                    priority: 1,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::person_resolve::PersonWebSearch),
            },
            // ── Person decoration ───────────────────────────────────
            ToolEntry {
                definition: ToolDefinition {
                    id: "guess_work_email",
                    strategies: &[DirectLookup, HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Person],
                    required_inputs: &[fields::NAME, fields::DOMAIN],
                    optional_inputs: &[fields::LINKEDIN_URL, fields::COMPANY],
                    outputs: &[fields::WORK_EMAIL, fields::EMAIL_VERIFICATION_STATUS],
                    cost_cents: 5,
                    tier: CostTier::Premium,
                    priority: 50,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::work_email::WorkEmailGuesser),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "fetch_person_profile",
                    strategies: &[DirectLookup, HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Person],
                    required_inputs: &[fields::NAME],
                    optional_inputs: &[fields::COMPANY],
                    outputs: &[
                        fields::BIO,
                        fields::PERSON_TWITTER,
                        fields::PERSON_GITHUB,
                        fields::PERSONAL_WEBSITE,
                    ],
                    cost_cents: 1,
                    tier: CostTier::Cheap,
                    priority: 60,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(tools::person_profile::PersonProfileFetcher),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "generate_email_candidates",
                    strategies: &[HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Person],
                    required_inputs: &[fields::NAME, fields::DOMAIN],
                    optional_inputs: &[],
                    outputs: &[fields::EMAIL_CANDIDATES],
                    cost_cents: 0,
                    tier: CostTier::Free,
                    priority: 91,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(UnimplementedTool {
                    id: "generate_email_candidates",
                }),
            },
            ToolEntry {
                definition: ToolDefinition {
                    id: "summarize_short_bio",
                    strategies: &[HypothesisAndScore, SearchAndValidate],
                    entity_types: &[Person],
                    required_inputs: &[fields::NAME],
                    optional_inputs: &[fields::COMPANY],
                    outputs: &[fields::SHORT_BIO],
                    cost_cents: 1,
                    tier: CostTier::Cheap,
                    priority: 92,
                    can_fail: true,
                    fallback_tool_id: None,
                },
                executor: Arc::new(UnimplementedTool {
                    id: "summarize_short_bio",
                }),
            },
        ];

        let registry = Self { entries };
        debug_assert!(registry.outputs_are_known());
        registry
    }

    fn outputs_are_known(&self) -> bool {
        self.entries.iter().all(|e| {
            e.definition
                .outputs
                .iter()
                .all(|o| fields::KNOWN_FIELDS.contains(o))
        })
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &str) -> Option<&ToolEntry> {
        self.entries.iter().find(|e| e.definition.id == id)
    }

    /// Entries applicable to an entity type, sorted by ascending priority.
    pub fn for_entity_type(&self, entity: EntityType) -> Vec<&ToolEntry> {
        let mut out: Vec<&ToolEntry> = self
            .entries
            .iter()
            .filter(|e| e.definition.entity_types.contains(&entity))
            .collect();
        out.sort_by_key(|e| e.definition.priority);
        out
    }

    /// Entries applicable to a strategy, sorted by ascending priority.
    pub fn for_strategy(&self, strategy: Strategy) -> Vec<&ToolEntry> {
        let mut out: Vec<&ToolEntry> = self
            .entries
            .iter()
            .filter(|e| e.definition.strategies.contains(&strategy))
            .collect();
        out.sort_by_key(|e| e.definition.priority);
        out
    }

    /// Entries matching both entity type and strategy, sorted by priority.
    pub fn matching(&self, entity: EntityType, strategy: Strategy) -> Vec<&ToolEntry> {
        let mut out: Vec<&ToolEntry> = self
            .entries
            .iter()
            .filter(|e| {
                e.definition.entity_types.contains(&entity)
                    && e.definition.strategies.contains(&strategy)
            })
            .collect();
        out.sort_by_key(|e| e.definition.priority);
        out
    }

    /// Every entry that can produce `field`, sorted by priority.
    pub fn for_output(&self, field: &str) -> Vec<&ToolEntry> {
        let mut out: Vec<&ToolEntry> = self
            .entries
            .iter()
            .filter(|e| e.definition.outputs.contains(&field))
            .collect();
        out.sort_by_key(|e| e.definition.priority);
        out
    }

    /// Check whether a tool's required inputs are covered.
    pub fn can_run(definition: &ToolDefinition, available: &BTreeSet<&'static str>) -> CanRun {
        let missing: Vec<&'static str> = definition
            .required_inputs
            .iter()
            .filter(|f| !available.contains(*f))
            .copied()
            .collect();
        CanRun {
            can_run: missing.is_empty(),
            missing,
        }
    }

    /// Total worst-case cost of a set of tool ids, cents.
    pub fn total_cost(&self, ids: &[&str]) -> u32 {
        ids.iter()
            .filter_map(|id| self.get(id))
            .map(|e| e.definition.cost_cents)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::EntityType::{Company, Person};
    use crate::classify::Strategy::{DirectLookup, HypothesisAndScore};

    #[test]
    fn every_output_is_a_known_field() {
        assert!(ToolRegistry::standard().outputs_are_known());
    }

    #[test]
    fn get_by_id() {
        let registry = ToolRegistry::standard();
        assert!(registry.get("resolve_company_from_name").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn matching_filters_and_sorts_by_priority() {
        let registry = ToolRegistry::standard();
        let tools = registry.matching(Company, HypothesisAndScore);
        assert!(!tools.is_empty());
        let priorities: Vec<u8> = tools.iter().map(|e| e.definition.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
        assert!(tools
            .iter()
            .all(|e| e.definition.entity_types.contains(&Company)));
    }

    #[test]
    fn direct_lookup_company_prefers_domain_resolver() {
        let registry = ToolRegistry::standard();
        let tools = registry.matching(Company, DirectLookup);
        assert_eq!(tools[0].definition.id, "resolve_company_from_domain");
    }

    #[test]
    fn for_output_finds_producers() {
        let registry = ToolRegistry::standard();
        let producers = registry.for_output(crate::fields::INDUSTRY);
        assert_eq!(producers.len(), 2);
        // Sorted by priority: the dedicated profile tool first.
        assert_eq!(producers[0].definition.id, "fetch_company_profile");

        let linkedin = registry.for_output(crate::fields::LINKEDIN_URL);
        assert!(linkedin.len() >= 2);
    }

    #[test]
    fn can_run_reports_missing_inputs() {
        let registry = ToolRegistry::standard();
        let def = &registry.get("guess_work_email").unwrap().definition;

        let mut available = BTreeSet::new();
        available.insert(crate::fields::NAME);
        let check = ToolRegistry::can_run(def, &available);
        assert!(!check.can_run);
        assert_eq!(check.missing, vec![crate::fields::DOMAIN]);

        available.insert(crate::fields::DOMAIN);
        assert!(ToolRegistry::can_run(def, &available).can_run);
    }

    #[test]
    fn total_cost_sums_known_ids() {
        let registry = ToolRegistry::standard();
        let cost = registry.total_cost(&["resolve_company_from_name", "fetch_company_profile"]);
        assert_eq!(cost, 3);
    }

    #[test]
    fn identity_resolvers_cannot_fail() {
        let registry = ToolRegistry::standard();
        for id in [
            "resolve_company_from_domain",
            "resolve_company_from_name",
            "resolve_person_from_name",
            "resolve_person_from_linkedin",
        ] {
            assert!(
                !registry.get(id).unwrap().definition.can_fail,
                "{id} must be can_fail=false"
            );
        }
    }

    #[test]
    fn advertised_only_tools_are_present_for_planning() {
        let registry = ToolRegistry::standard();
        for id in [
            "detect_tech_stack",
            "generate_email_candidates",
            "summarize_short_bio",
        ] {
            assert!(registry.get(id).is_some(), "{id} missing");
        }
    }

    #[test]
    fn person_tools_are_first_class() {
        let registry = ToolRegistry::standard();
        assert!(!registry.for_entity_type(Person).is_empty());
        assert!(!registry.for_entity_type(Company).is_empty());
    }
}
