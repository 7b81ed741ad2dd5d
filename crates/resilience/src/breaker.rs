//! Count-based circuit breaker.
//!
//! States:
//! - Closed: calls pass through, outcomes go into a rolling window
//! - Open: calls are refused until the cool-down has elapsed
//! - HalfOpen: a bounded number of probe calls decide whether to close

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes considered while closed.
    pub window_size: usize,
    /// Outcomes needed in the window before the failure rate is evaluated.
    pub minimum_calls: usize,
    /// Failure rate (0.0..=1.0) at or above which the breaker opens.
    pub failure_rate_threshold: f64,
    /// How long the breaker stays open before admitting probes.
    pub open_duration: Duration,
    /// Concurrent probe calls admitted while half-open.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 0.5,
            open_duration: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    /// `true` marks a failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_in_flight: u32,
    /// Set by `force_open`; only `reset` leaves this state.
    forced: bool,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(config.window_size),
                opened_at: None,
                probes_in_flight: 0,
                forced: false,
            })),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state as last recorded. An open breaker whose cool-down has
    /// elapsed reports `Open` until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failure rate over the current window, 0.0 when it is empty.
    pub fn failure_rate(&self) -> f64 {
        let st = self.lock();
        failure_rate(&st.window)
    }

    /// Asks to run one call. Returns `None` when the call must be refused.
    ///
    /// The returned permit must be resolved with [`Permit::success`] or
    /// [`Permit::failure`]; dropping it unresolved records nothing.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut st = self.lock();

        if st.state == CircuitState::Open {
            let cooled = st
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.open_duration);
            if st.forced || !cooled {
                return None;
            }
            self.transition(&mut st, CircuitState::HalfOpen);
        }

        if st.state == CircuitState::HalfOpen {
            if st.probes_in_flight >= self.config.half_open_max_calls {
                return None;
            }
            st.probes_in_flight += 1;
            return Some(Permit {
                breaker: self,
                probe: true,
                resolved: false,
            });
        }

        Some(Permit {
            breaker: self,
            probe: false,
            resolved: false,
        })
    }

    /// Opens the breaker and keeps it open until [`reset`](Self::reset).
    pub fn force_open(&self) {
        let mut st = self.lock();
        st.forced = true;
        self.transition(&mut st, CircuitState::Open);
    }

    /// Manually reset the circuit breaker
    pub fn reset(&self) {
        let mut st = self.lock();
        st.forced = false;
        self.transition(&mut st, CircuitState::Closed);
    }

    fn record(&self, probe: bool, failed: bool) {
        let mut st = self.lock();

        if probe {
            st.probes_in_flight = st.probes_in_flight.saturating_sub(1);
        }

        match st.state {
            CircuitState::HalfOpen if probe => {
                if failed {
                    tracing::warn!(breaker = %self.name, "probe failed, reopening circuit");
                    self.transition(&mut st, CircuitState::Open);
                } else {
                    self.transition(&mut st, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                if st.window.len() == self.config.window_size {
                    st.window.pop_front();
                }
                st.window.push_back(failed);

                let rate = failure_rate(&st.window);
                if st.window.len() >= self.config.minimum_calls
                    && rate >= self.config.failure_rate_threshold
                {
                    tracing::warn!(
                        breaker = %self.name,
                        failure_rate = rate,
                        calls = st.window.len(),
                        "failure rate over threshold, opening circuit"
                    );
                    self.transition(&mut st, CircuitState::Open);
                }
            }
            // Calls admitted before the breaker opened finish here.
            _ => {}
        }
    }

    fn release_probe(&self) {
        let mut st = self.lock();
        st.probes_in_flight = st.probes_in_flight.saturating_sub(1);
    }

    fn transition(&self, st: &mut BreakerState, to: CircuitState) {
        let from = st.state;
        st.state = to;
        st.probes_in_flight = 0;
        match to {
            CircuitState::Open => st.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                st.opened_at = None;
                st.window.clear();
            }
            CircuitState::HalfOpen => {}
        }

        if from != to {
            tracing::info!(breaker = %self.name, %from, %to, "circuit breaker transition");
            metrics::counter!(
                "circuit_breaker_transitions_total",
                "breaker" => self.name.to_string(),
                "to" => to.as_str()
            )
            .increment(1);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn failure_rate(window: &VecDeque<bool>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().filter(|failed| **failed).count() as f64 / window.len() as f64
}

/// Admission to run one call through a [`CircuitBreaker`].
#[must_use = "a permit must be resolved with success() or failure()"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    resolved: bool,
}

impl Permit<'_> {
    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record(self.probe, false);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record(self.probe, true);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.probe {
            self.breaker.release_probe();
        }
    }
}
