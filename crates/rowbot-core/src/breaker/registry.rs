//! Registry of per-provider circuit breakers.
//!
//! Breakers are process-lifetime singletons created on first use. The
//! registry is the operator surface: metrics table, healthy-provider
//! ranking, and forced state changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::{BreakerMetrics, CircuitBreaker, CircuitState};
use crate::config::BreakerConfig;

/// A provider ranked by health for smart routing.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    /// Provider name.
    pub provider: String,
    /// `(1 − errorRate)·100 − p50/100`; higher is healthier.
    pub score: f64,
    /// The metrics the score was derived from.
    pub metrics: BreakerMetrics,
}

/// Creates and holds one breaker per provider name.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create an empty registry sharing `config` across breakers.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (or lazily create) the breaker for `provider`.
    pub fn get(&self, provider: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("breaker registry lock");
        Arc::clone(
            breakers
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(provider, self.config.clone()))),
        )
    }

    /// Names of every registered provider, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .breakers
            .lock()
            .expect("breaker registry lock")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Metrics for every registered provider, sorted by name.
    pub fn metrics_table_at(&self, now: DateTime<Utc>) -> Vec<BreakerMetrics> {
        let breakers: Vec<Arc<CircuitBreaker>> = {
            let map = self.breakers.lock().expect("breaker registry lock");
            map.values().cloned().collect()
        };
        let mut table: Vec<BreakerMetrics> =
            breakers.iter().map(|b| b.metrics_at(now)).collect();
        table.sort_by(|a, b| a.provider.cmp(&b.provider));
        table
    }

    /// Metrics for every registered provider using the current wall clock.
    pub fn metrics_table(&self) -> Vec<BreakerMetrics> {
        self.metrics_table_at(Utc::now())
    }

    /// Providers currently accepting requests, ranked healthiest first.
    pub fn healthy_providers_at(&self, now: DateTime<Utc>) -> Vec<ProviderHealth> {
        let breakers: Vec<Arc<CircuitBreaker>> = {
            let map = self.breakers.lock().expect("breaker registry lock");
            map.values().cloned().collect()
        };

        let mut healthy: Vec<ProviderHealth> = breakers
            .iter()
            .filter(|b| b.can_request_at(now))
            .map(|b| {
                let metrics = b.metrics_at(now);
                let score =
                    (1.0 - metrics.error_rate) * 100.0 - metrics.p50_ms as f64 / 100.0;
                ProviderHealth {
                    provider: metrics.provider.clone(),
                    score,
                    metrics,
                }
            })
            .collect();
        healthy.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        healthy
    }

    /// Providers currently accepting requests, using the wall clock.
    pub fn healthy_providers(&self) -> Vec<ProviderHealth> {
        self.healthy_providers_at(Utc::now())
    }

    /// Force the state of `provider`'s breaker, creating it if needed.
    pub fn force_state(&self, provider: &str, state: CircuitState) {
        self.get(provider).force_state(state);
    }
}
