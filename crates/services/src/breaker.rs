use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

/// Per-dependency circuit breaker. One instance guards all calls to one
/// external analysis service; a failing dependency never affects another's
/// breaker.
///
/// Uses `tokio::time::Instant` throughout so the state machine can be
/// driven with a paused clock in tests.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures within `window` that trip the breaker.
    pub failure_threshold: u32,
    /// Rolling window over which failures are counted.
    pub window: Duration,
    /// Time spent Open before trial calls are allowed.
    pub reset_timeout: Duration,
    /// Concurrent trial calls permitted while Half-Open.
    pub half_open_max_calls: u32,
    /// Per-call deadline; exceeding it counts as a failure.
    pub call_timeout: Duration,
}

impl From<&intervue_config::BreakerSettings> for BreakerConfig {
    fn from(s: &intervue_config::BreakerSettings) -> Self {
        Self {
            failure_threshold: s.failure_threshold,
            window: Duration::from_secs(s.window_secs),
            reset_timeout: Duration::from_secs(s.reset_timeout_secs),
            half_open_max_calls: s.half_open_max_calls,
            call_timeout: Duration::from_secs(s.call_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    /// Timestamps of recent failures, pruned to the rolling window.
    failure_window: VecDeque<Instant>,
    opened_at: Option<Instant>,
    last_transition: Instant,
    half_open_in_flight: u32,
    total_successes: u64,
    total_failures: u64,
    total_timeouts: u64,
    total_short_circuits: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit open")]
    Open,
    #[error("call timed out")]
    Timeout,
    #[error("upstream error: {0}")]
    Upstream(E),
}

/// Point-in-time view of one breaker, for health introspection.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub window_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_timeouts: u64,
    pub total_short_circuits: u64,
    pub seconds_since_transition: u64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_window: VecDeque::new(),
                opened_at: None,
                last_transition: Instant::now(),
                half_open_in_flight: 0,
                total_successes: 0,
                total_failures: 0,
                total_timeouts: 0,
                total_short_circuits: 0,
            }),
        }
    }

    /// Runs `fut` under the breaker: short-circuits while Open, enforces the
    /// call timeout, and feeds the outcome back into the state machine.
    pub async fn call<F, T, E>(&self, fut: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;

        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(Ok(value)) => {
                self.on_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.on_failure(false);
                Err(BreakerError::Upstream(e))
            }
            Err(_) => {
                self.on_failure(true);
                Err(BreakerError::Timeout)
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            window_failures: inner.failure_window.len() as u32,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_timeouts: inner.total_timeouts,
            total_short_circuits: inner.total_short_circuits,
            seconds_since_transition: inner.last_transition.elapsed().as_secs(),
        }
    }

    fn try_acquire<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    self.transition(&mut inner, BreakerState::HalfOpen);
                    inner.half_open_in_flight = 1;
                    Ok(())
                } else {
                    inner.total_short_circuits += 1;
                    Err(BreakerError::Open)
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_calls {
                    inner.half_open_in_flight += 1;
                    Ok(())
                } else {
                    inner.total_short_circuits += 1;
                    Err(BreakerError::Open)
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;
        if inner.state == BreakerState::HalfOpen {
            inner.failure_window.clear();
            inner.half_open_in_flight = 0;
            inner.opened_at = None;
            self.transition(&mut inner, BreakerState::Closed);
        }
    }

    fn on_failure(&self, timed_out: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        if timed_out {
            inner.total_timeouts += 1;
        }

        match inner.state {
            BreakerState::HalfOpen => {
                // A failed trial restarts the reset timeout.
                inner.half_open_in_flight = 0;
                inner.opened_at = Some(now);
                self.transition(&mut inner, BreakerState::Open);
            }
            BreakerState::Closed => {
                inner.failure_window.push_back(now);
                if let Some(horizon) = now.checked_sub(self.config.window) {
                    while inner
                        .failure_window
                        .front()
                        .is_some_and(|t| *t < horizon)
                    {
                        inner.failure_window.pop_front();
                    }
                }
                if inner.failure_window.len() as u32 >= self.config.failure_threshold {
                    inner.opened_at = Some(now);
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn transition(&self, inner: &mut Inner, next: BreakerState) {
        if inner.state == next {
            return;
        }
        if next == BreakerState::Open {
            warn!(breaker = %self.name, from = ?inner.state, "circuit opened");
        } else {
            info!(breaker = %self.name, from = ?inner.state, to = ?next, "circuit transition");
        }
        inner.state = next;
        inner.last_transition = Instant::now();
    }
}

/// Breaker-per-dependency registry backing the health endpoint. Breakers
/// are created lazily on first use with the shared config.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snaps: Vec<BreakerSnapshot> =
            self.breakers.iter().map(|e| e.value().snapshot()).collect();
        snaps.sort_by(|a, b| a.name.cmp(&b.name));
        snaps
    }
}
