//! The reliability stack wrapped around every external call.
//!
//! Fixed outer-to-inner order: cache lookup, then singleflight coalescing,
//! then the provider's circuit breaker, then the raw call. Successful
//! results are written back as positive entries; a "known absent" answer
//! becomes a negative entry with the long TTL; a failed call becomes a
//! negative entry with the short TTL so retries short-circuit.

use std::time::Duration;

use serde_json::Value;

use crate::breaker::registry::BreakerRegistry;
use crate::cache::Cache;
use crate::error::ProviderError;
use crate::flight::{provider_flight_key, FlightFailure, Singleflight};

/// One provider call's identity and policy knobs.
#[derive(Debug, Clone)]
pub struct CallSpec {
    /// Provider name; selects the breaker and flight group.
    pub provider: &'static str,
    /// Cache base key (prefix and version are added by the cache).
    pub base_key: String,
    /// Positive-entry TTL.
    pub ttl: Duration,
    /// Cost recorded in the breaker window, cents.
    pub cost_cents: u32,
    /// Optional timeout enforced by the breaker wrapper.
    pub timeout: Option<Duration>,
}

/// Run `fetch` under the full reliability stack.
///
/// `Ok(None)` means "known absent": either the provider just answered so,
/// or a live negative cache entry short-circuited the call.
pub async fn call<F>(
    cache: &Cache,
    flights: &Singleflight,
    breakers: &BreakerRegistry,
    spec: CallSpec,
    fetch: F,
) -> Result<Option<Value>, ProviderError>
where
    F: std::future::Future<Output = Result<Option<Value>, ProviderError>>,
{
    let lookup = cache.get(&spec.base_key).await;
    if lookup.hit {
        tracing::debug!(
            key = %spec.base_key,
            negative = lookup.is_negative,
            "cache hit, provider call skipped",
        );
        return Ok(lookup.value);
    }

    let flight_key = provider_flight_key(spec.provider, &cache.full_key(&spec.base_key));
    let breaker = breakers.get(spec.provider);

    let outcome = flights
        .run(&flight_key, async {
            match breaker.call(spec.cost_cents, spec.timeout, fetch).await {
                Ok(Some(value)) => {
                    cache.set(&spec.base_key, &value, spec.ttl).await;
                    Ok(Some(value))
                }
                Ok(None) => {
                    cache.set_negative(&spec.base_key, true).await;
                    Ok(None)
                }
                Err(err @ ProviderError::CircuitOpen { .. }) => {
                    // Breaker refusals are not provider answers; nothing is cached.
                    Err(FlightFailure::from(&err))
                }
                Err(err) => {
                    cache.set_negative(&spec.base_key, false).await;
                    Err(FlightFailure::from(&err))
                }
            }
        })
        .await;

    outcome.map_err(ProviderError::from)
}
