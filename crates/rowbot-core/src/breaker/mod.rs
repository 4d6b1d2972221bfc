//! Per-provider circuit breaker with a rolling metrics window.
//!
//! Three states with a fixed transition set: CLOSED→OPEN on sustained
//! failures, OPEN→HALF_OPEN after the reset timeout, HALF_OPEN→OPEN on a
//! single failure, HALF_OPEN→CLOSED after enough successes. All state
//! mutation happens inside one guarded section; transitions are single
//! decision points.

pub mod registry;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BreakerConfig;
use crate::error::ProviderError;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    /// Requests flow; failures are counted.
    Closed,
    /// Requests are refused until the reset timeout elapses.
    Open,
    /// Trial requests flow; one failure reopens, enough successes close.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

impl std::str::FromStr for CircuitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "closed" => Ok(CircuitState::Closed),
            "open" => Ok(CircuitState::Open),
            "half_open" | "halfopen" => Ok(CircuitState::HalfOpen),
            other => Err(format!("unknown breaker state '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
struct CallRecord {
    at: DateTime<Utc>,
    success: bool,
    latency_ms: u64,
    cost_cents: u32,
    timeout: bool,
}

struct Inner {
    state: CircuitState,
    failures: u32,
    half_open_successes: u32,
    last_failure_at: Option<DateTime<Utc>>,
    window: VecDeque<CallRecord>,
}

/// Rolling-window metrics for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerMetrics {
    /// Provider name.
    pub provider: String,
    /// Current state.
    pub state: CircuitState,
    /// Calls in the window.
    pub total: u64,
    /// Successful calls in the window.
    pub successful: u64,
    /// Failed calls in the window.
    pub failed: u64,
    /// Timed-out calls in the window (subset of failed).
    pub timeouts: u64,
    /// failed / total (0 when the window is empty).
    pub error_rate: f64,
    /// Median latency, milliseconds.
    pub p50_ms: u64,
    /// 95th percentile latency, milliseconds.
    pub p95_ms: u64,
    /// 99th percentile latency, milliseconds.
    pub p99_ms: u64,
    /// Mean recorded cost, cents.
    pub avg_cost_cents: f64,
    /// When open: milliseconds until a trial request is allowed.
    pub next_retry_in_ms: Option<u64>,
}

/// Circuit breaker for a single provider. Process-lifetime singleton,
/// created by the [`registry::BreakerRegistry`].
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: &str, config: BreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                half_open_successes: 0,
                last_failure_at: None,
                window: VecDeque::new(),
            }),
        }
    }

    /// The provider this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state without side effects.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock").state
    }

    /// Whether a request may proceed right now.
    pub fn can_request(&self) -> bool {
        self.can_request_at(Utc::now())
    }

    /// Whether a request may proceed at `now`.
    ///
    /// An open breaker whose reset timeout has elapsed transitions to
    /// half-open here; this check is the only OPEN→HALF_OPEN edge.
    pub fn can_request_at(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed_ms = inner
                    .last_failure_at
                    .map(|t| (now - t).num_milliseconds().max(0) as u64)
                    .unwrap_or(u64::MAX);
                if elapsed_ms >= self.config.reset_timeout_ms {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    tracing::info!(provider = %self.name, "breaker half-open");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Milliseconds until an open breaker allows a trial request.
    pub fn next_retry_in_ms_at(&self, now: DateTime<Utc>) -> u64 {
        let inner = self.inner.lock().expect("breaker lock");
        match (inner.state, inner.last_failure_at) {
            (CircuitState::Open, Some(t)) => {
                let elapsed_ms = (now - t).num_milliseconds().max(0) as u64;
                self.config.reset_timeout_ms.saturating_sub(elapsed_ms)
            }
            _ => 0,
        }
    }

    /// Record a successful call.
    pub fn record_success_at(&self, now: DateTime<Utc>, latency_ms: u64, cost_cents: u32) {
        let mut inner = self.inner.lock().expect("breaker lock");
        Self::push_record(
            &mut inner,
            &self.config,
            CallRecord {
                at: now,
                success: true,
                latency_ms,
                cost_cents,
                timeout: false,
            },
        );
        match inner.state {
            CircuitState::Closed => {
                inner.failures = inner.failures.saturating_sub(1);
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.half_open_successes = 0;
                    tracing::info!(provider = %self.name, "breaker closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call. `timed_out` marks breaker timeouts, whose
    /// latency equals the timeout itself.
    pub fn record_failure_at(
        &self,
        now: DateTime<Utc>,
        latency_ms: u64,
        cost_cents: u32,
        timed_out: bool,
    ) {
        let mut inner = self.inner.lock().expect("breaker lock");
        Self::push_record(
            &mut inner,
            &self.config,
            CallRecord {
                at: now,
                success: false,
                latency_ms,
                cost_cents,
                timeout: timed_out,
            },
        );
        inner.last_failure_at = Some(now);
        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.window.len() as u32 >= self.config.minimum_requests
                    && inner.failures >= self.config.failure_threshold
                {
                    inner.state = CircuitState::Open;
                    tracing::warn!(provider = %self.name, failures = inner.failures, "breaker opened");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.half_open_successes = 0;
                tracing::warn!(provider = %self.name, "breaker reopened from half-open");
            }
            CircuitState::Open => {}
        }
    }

    /// Force a state (operator admin surface).
    pub fn force_state(&self, state: CircuitState) {
        let mut inner = self.inner.lock().expect("breaker lock");
        inner.state = state;
        inner.failures = 0;
        inner.half_open_successes = 0;
        if state == CircuitState::Open {
            inner.last_failure_at = Some(Utc::now());
        }
        tracing::warn!(provider = %self.name, state = %state, "breaker state forced");
    }

    /// Execute `fut` under this breaker, timing it and recording the outcome.
    ///
    /// A `timeout` elapse is recorded as a failure whose latency equals the
    /// timeout. When the breaker refuses, no call is made.
    pub async fn call<T, F>(
        &self,
        cost_cents: u32,
        timeout: Option<Duration>,
        fut: F,
    ) -> Result<T, ProviderError>
    where
        F: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let now = Utc::now();
        if !self.can_request_at(now) {
            return Err(ProviderError::CircuitOpen {
                provider: self.name.clone(),
                retry_in_ms: self.next_retry_in_ms_at(now),
            });
        }

        let started = std::time::Instant::now();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => {
                    let limit_ms = limit.as_millis() as u64;
                    self.record_failure_at(Utc::now(), limit_ms, cost_cents, true);
                    return Err(ProviderError::Timeout {
                        provider: self.name.clone(),
                        after_ms: limit_ms,
                    });
                }
            },
            None => fut.await,
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(value) => {
                self.record_success_at(Utc::now(), latency_ms, cost_cents);
                Ok(value)
            }
            Err(e) => {
                self.record_failure_at(Utc::now(), latency_ms, cost_cents, false);
                Err(e)
            }
        }
    }

    /// Rolling-window metrics at `now`.
    pub fn metrics_at(&self, now: DateTime<Utc>) -> BreakerMetrics {
        let mut inner = self.inner.lock().expect("breaker lock");
        Self::prune(&mut inner, &self.config, now);

        let total = inner.window.len() as u64;
        let successful = inner.window.iter().filter(|r| r.success).count() as u64;
        let failed = total - successful;
        let timeouts = inner.window.iter().filter(|r| r.timeout).count() as u64;
        let error_rate = if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64
        };
        let avg_cost_cents = if total == 0 {
            0.0
        } else {
            inner.window.iter().map(|r| f64::from(r.cost_cents)).sum::<f64>() / total as f64
        };

        let mut latencies: Vec<u64> = inner.window.iter().map(|r| r.latency_ms).collect();
        latencies.sort_unstable();

        let next_retry_in_ms = match (inner.state, inner.last_failure_at) {
            (CircuitState::Open, Some(t)) => {
                let elapsed_ms = (now - t).num_milliseconds().max(0) as u64;
                Some(self.config.reset_timeout_ms.saturating_sub(elapsed_ms))
            }
            _ => None,
        };

        BreakerMetrics {
            provider: self.name.clone(),
            state: inner.state,
            total,
            successful,
            failed,
            timeouts,
            error_rate,
            p50_ms: percentile(&latencies, 0.50),
            p95_ms: percentile(&latencies, 0.95),
            p99_ms: percentile(&latencies, 0.99),
            avg_cost_cents,
            next_retry_in_ms,
        }
    }

    /// Rolling-window metrics using the current wall clock.
    pub fn metrics(&self) -> BreakerMetrics {
        self.metrics_at(Utc::now())
    }

    fn push_record(inner: &mut Inner, config: &BreakerConfig, record: CallRecord) {
        let now = record.at;
        inner.window.push_back(record);
        Self::prune(inner, config, now);
    }

    fn prune(inner: &mut Inner, config: &BreakerConfig, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::milliseconds(config.window_ms as i64);
        while inner.window.front().is_some_and(|r| r.at < cutoff) {
            inner.window.pop_front();
        }
    }
}

/// Nearest-rank percentile over sorted latencies.
fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
