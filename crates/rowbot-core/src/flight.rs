//! Singleflight: coalesces concurrent calls on identical keys.
//!
//! For any key, at most one invocation of the underlying function runs at a
//! time; every concurrent caller for that key receives the same outcome,
//! success or failure. Used at two levels: per enrichment cell
//! (`cell:<rowId>:<field>`) and per provider call (`provider:<name>:<key>`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::ProviderError;

/// Shared outcome of a flight. Cloneable so every waiter gets a copy.
///
/// `Ok(None)` means the leader observed a cached negative ("known absent").
pub type FlightResult = Result<Option<Value>, FlightFailure>;

/// A failure every waiter of a flight observes.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightFailure {
    /// The provider's breaker refused the leader's call.
    CircuitOpen {
        /// Provider whose breaker is open.
        provider: String,
        /// Milliseconds until a trial request is allowed.
        retry_in_ms: u64,
    },
    /// Any other leader failure, flattened to its message.
    Upstream {
        /// The leader's error message.
        message: String,
    },
}

impl From<FlightFailure> for ProviderError {
    fn from(f: FlightFailure) -> Self {
        match f {
            FlightFailure::CircuitOpen {
                provider,
                retry_in_ms,
            } => ProviderError::CircuitOpen {
                provider,
                retry_in_ms,
            },
            FlightFailure::Upstream { message } => ProviderError::Coalesced(message),
        }
    }
}

impl From<&ProviderError> for FlightFailure {
    fn from(e: &ProviderError) -> Self {
        match e {
            ProviderError::CircuitOpen {
                provider,
                retry_in_ms,
            } => FlightFailure::CircuitOpen {
                provider: provider.clone(),
                retry_in_ms: *retry_in_ms,
            },
            other => FlightFailure::Upstream {
                message: other.to_string(),
            },
        }
    }
}

struct FlightHandle {
    rx: watch::Receiver<Option<FlightResult>>,
}

/// Outcome of registering for a key: either join an existing flight as a
/// waiter, or become its leader.
enum Registration {
    Waiter(watch::Receiver<Option<FlightResult>>),
    Leader(watch::Sender<Option<FlightResult>>),
}

/// Counters exposed on the operator health surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlightStats {
    /// Total `run` calls.
    pub total: u64,
    /// Calls that joined an existing flight.
    pub coalesced: u64,
    /// Flights that actually executed the function.
    pub executed: u64,
    /// Executed flights that failed.
    pub errors: u64,
    /// Mean waiters per executed flight.
    pub mean_waiters: f64,
}

/// Coalescing table for one logical group.
pub struct Singleflight {
    flights: Mutex<HashMap<String, FlightHandle>>,
    total: AtomicU64,
    coalesced: AtomicU64,
    executed: AtomicU64,
    errors: AtomicU64,
}

impl Default for Singleflight {
    fn default() -> Self {
        Self::new()
    }
}

impl Singleflight {
    /// Create an empty flight table.
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            total: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Register as either a waiter on an existing flight or the leader of a
    /// new one under `key`. The lock is held only for the duration of this
    /// (non-async) call, so the guard never crosses an `await` point.
    ///
    /// The registration check and insert are a single locked step so two
    /// racing callers can never both become the leader.
    fn register(&self, key: &str) -> Registration {
        let mut flights = self.flights.lock().expect("flight table lock");
        if let Some(handle) = flights.get(key) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            Registration::Waiter(handle.rx.clone())
        } else {
            let (tx, rx) = watch::channel(None);
            flights.insert(key.to_string(), FlightHandle { rx });
            Registration::Leader(tx)
        }
    }

    /// Run `fut` under `key`, coalescing with any in-progress flight.
    pub async fn run<F>(&self, key: &str, fut: F) -> FlightResult
    where
        F: std::future::Future<Output = FlightResult>,
    {
        self.total.fetch_add(1, Ordering::Relaxed);

        match self.register(key) {
            Registration::Leader(tx) => self.lead(key, tx, fut).await,
            Registration::Waiter(mut rx) => {
                let outcome = rx.wait_for(|v| v.is_some()).await;
                match outcome {
                    Ok(value) => value.clone().expect("wait_for guarantees Some"),
                    // Leader dropped without publishing (cancelled).
                    Err(_) => Err(FlightFailure::Upstream {
                        message: "coalesced flight was cancelled".to_string(),
                    }),
                }
            }
        }
    }

    async fn lead<F>(
        &self,
        key: &str,
        tx: watch::Sender<Option<FlightResult>>,
        fut: F,
    ) -> FlightResult
    where
        F: std::future::Future<Output = FlightResult>,
    {
        struct Unregister<'a> {
            flights: &'a Mutex<HashMap<String, FlightHandle>>,
            key: String,
        }
        impl Drop for Unregister<'_> {
            fn drop(&mut self) {
                self.flights
                    .lock()
                    .expect("flight table lock")
                    .remove(&self.key);
            }
        }

        // Unregisters on every exit path, including leader cancellation,
        // so no waiter can join a dead flight.
        let _guard = Unregister {
            flights: &self.flights,
            key: key.to_string(),
        };

        let result = fut.await;
        self.executed.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        // Publish before unregistering (guard drops after this line) so
        // waiters holding a receiver always observe the outcome.
        let _ = tx.send(Some(result.clone()));
        result
    }

    /// Number of flights currently in progress.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().expect("flight table lock").len()
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> FlightStats {
        let executed = self.executed.load(Ordering::Relaxed);
        let coalesced = self.coalesced.load(Ordering::Relaxed);
        FlightStats {
            total: self.total.load(Ordering::Relaxed),
            coalesced,
            executed,
            errors: self.errors.load(Ordering::Relaxed),
            mean_waiters: if executed == 0 {
                0.0
            } else {
                coalesced as f64 / executed as f64
            },
        }
    }
}

/// Flight key for a single enrichment cell.
pub fn cell_flight_key(row_id: &str, field: &str) -> String {
    format!("cell:{row_id}:{field}")
}

/// Flight key for a provider call.
///
/// Keyed by the full cache key rather than the row so identical logical
/// requests coalesce across rows.
pub fn provider_flight_key(provider: &str, cache_key: &str) -> String {
    format!("provider:{provider}:{cache_key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    #[tokio::test]
    async fn single_caller_executes() {
        let flights = Singleflight::new();
        let result = flights
            .run("k", async { Ok(Some(json!(42))) })
            .await
            .unwrap();
        assert_eq!(result, Some(json!(42)));
        let stats = flights.stats();
        assert_eq!(stats.executed, 1);
        assert_eq!(stats.coalesced, 0);
    }

    #[tokio::test]
    async fn concurrent_callers_coalesce_to_one_execution() {
        let flights = Arc::new(Singleflight::new());
        let executions = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let executions = Arc::clone(&executions);
            handles.push(tokio::spawn(async move {
                flights
                    .run("shared", async {
                        executions.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(Some(json!("done")))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.expect("join").unwrap();
            assert_eq!(result, Some(json!("done")));
        }
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(flights.stats().executed, 1);
        assert_eq!(flights.stats().coalesced, 7);
    }

    #[tokio::test]
    async fn waiters_observe_leader_failure() {
        let flights = Arc::new(Singleflight::new());

        let leader = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run("k", async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(FlightFailure::Upstream {
                            message: "boom".to_string(),
                        })
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let waiter = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run("k", async {
                        panic!("waiter must never execute");
                    })
                    .await
            })
        };

        let leader_err = leader.await.expect("join").unwrap_err();
        let waiter_err = waiter.await.expect("join").unwrap_err();
        assert_eq!(leader_err, waiter_err);
        assert_eq!(flights.stats().errors, 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flights = Arc::new(Singleflight::new());
        let a = flights.run("a", async { Ok(Some(json!(1))) });
        let b = flights.run("b", async { Ok(Some(json!(2))) });
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra.unwrap(), Some(json!(1)));
        assert_eq!(rb.unwrap(), Some(json!(2)));
        assert_eq!(flights.stats().executed, 2);
    }

    #[tokio::test]
    async fn table_drains_after_completion() {
        let flights = Singleflight::new();
        let _ = flights.run("k", async { Ok(None) }).await;
        assert_eq!(flights.in_flight(), 0);
    }

    #[test]
    fn flight_key_formats() {
        assert_eq!(cell_flight_key("r1", "domain"), "cell:r1:domain");
        assert_eq!(
            provider_flight_key("serper", "enrich:v3:v1:search:abc"),
            "provider:serper:enrich:v3:v1:search:abc"
        );
    }

    #[test]
    fn circuit_open_failure_maps_back_to_provider_error() {
        let failure = FlightFailure::CircuitOpen {
            provider: "serper".to_string(),
            retry_in_ms: 1000,
        };
        match ProviderError::from(failure) {
            ProviderError::CircuitOpen { provider, .. } => assert_eq!(provider, "serper"),
            other => panic!("expected CircuitOpen, got: {other}"),
        }
    }
}
