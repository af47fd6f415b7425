//! Circuit breaker protecting the LMS backend from request storms.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast without network I/O
//! - Half-Open: cooldown expired, probing whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open:      failure count reaches the configured threshold
//! Open → Half-Open:   reset timeout elapsed since the last failure
//! Half-Open → Closed: three consecutive successful probes
//! Half-Open → Open:   any probe failure
//! ```
//!
//! The breaker is a coarse global health signal for one backend, not a
//! per-request ledger: concurrent requests record outcomes in whichever
//! order they complete.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::CircuitConfig;

/// Consecutive half-open successes required to close the circuit.
///
/// More than one probe must succeed before traffic fully resumes, so a
/// backend that is only partially recovered does not flap the breaker
/// between open and closed.
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 3;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, all requests allowed.
    Closed,
    /// Backend unhealthy, requests refused immediately.
    Open,
    /// Testing recovery with a limited number of probes.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Read-only snapshot of circuit breaker state for monitoring.
#[derive(Debug, Clone)]
pub struct ClientStats {
    /// Current circuit state.
    pub circuit_state: CircuitState,
    /// Recorded failures not yet healed by successes.
    pub failure_count: u32,
    /// Consecutive successes while half-open.
    pub success_count: u32,
    /// When the last failure was recorded, if any.
    pub last_failure_time: Option<Instant>,
}

/// Circuit breaker state machine for a single backend.
///
/// Callers pass the current instant into every method so time-dependent
/// transitions stay deterministic under a test clock. Transitions are the
/// only way `state` changes; there is no direct external mutation.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    config: CircuitConfig,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    /// Creates a closed breaker with zeroed counters.
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
        }
    }

    /// Applies the Open → Half-Open transition when the cooldown has elapsed
    /// and returns the state requests should be gated on.
    ///
    /// This is the only place that transition happens; `record_success` and
    /// `record_failure` never set Half-Open themselves.
    pub fn update_state(&mut self, now: Instant) -> CircuitState {
        if self.state == CircuitState::Open {
            if let Some(last_failure) = self.last_failure_time {
                if now.duration_since(last_failure) >= self.config.reset_timeout {
                    tracing::info!("circuit breaker transitioning to half-open");
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                }
            }
        }

        self.state
    }

    /// Records a successful request outcome.
    ///
    /// Half-open successes accumulate toward closing the circuit. Closed
    /// successes heal one recorded failure each, so transient failure
    /// history decays without a hard reset.
    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = self.failure_count.saturating_sub(1);
            },
            CircuitState::Open => {
                tracing::warn!("recorded success while circuit open");
            },
            CircuitState::HalfOpen => {
                self.success_count += 1;

                if self.success_count >= HALF_OPEN_SUCCESS_THRESHOLD {
                    tracing::info!(
                        successes = self.success_count,
                        "circuit breaker closing, backend recovered"
                    );
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                }
            },
        }
    }

    /// Records a failed request outcome.
    ///
    /// Opens the circuit once the failure count reaches the threshold. A
    /// half-open failure reopens immediately because the count is still at
    /// or above threshold from the outage that opened the circuit.
    pub fn record_failure(&mut self, now: Instant) {
        self.failure_count += 1;
        self.last_failure_time = Some(now);

        if self.state != CircuitState::Open && self.failure_count >= self.config.failure_threshold {
            tracing::warn!(failures = self.failure_count, "circuit breaker opening");
            self.state = CircuitState::Open;
            self.success_count = 0;
        }
    }

    /// Forces the breaker back to its initial closed state.
    pub fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.last_failure_time = None;
    }

    /// Returns a snapshot of the current breaker state.
    pub fn snapshot(&self) -> ClientStats {
        ClientStats {
            circuit_state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            last_failure_time: self.last_failure_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn test_config() -> CircuitConfig {
        CircuitConfig { failure_threshold: 3, reset_timeout: Duration::from_secs(60) }
    }

    #[test]
    fn breaker_starts_closed() {
        let breaker = CircuitBreaker::new(test_config());
        let stats = breaker.snapshot();

        assert_eq!(stats.circuit_state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert!(stats.last_failure_time.is_none());
    }

    #[test]
    fn failures_open_circuit_at_threshold() {
        let mut breaker = CircuitBreaker::new(test_config());
        let now = Instant::now();

        breaker.record_failure(now);
        breaker.record_failure(now);
        assert_eq!(breaker.snapshot().circuit_state, CircuitState::Closed);

        breaker.record_failure(now);
        assert_eq!(breaker.snapshot().circuit_state, CircuitState::Open);
        assert_eq!(breaker.snapshot().failure_count, 3);
    }

    #[test]
    fn closed_successes_heal_failure_history() {
        let mut breaker = CircuitBreaker::new(test_config());
        let now = Instant::now();

        breaker.record_failure(now);
        breaker.record_failure(now);
        breaker.record_success();
        assert_eq!(breaker.snapshot().failure_count, 1);

        // Healing floors at zero
        breaker.record_success();
        breaker.record_success();
        assert_eq!(breaker.snapshot().failure_count, 0);

        // Two more failures still below threshold thanks to healing
        breaker.record_failure(now);
        breaker.record_failure(now);
        assert_eq!(breaker.snapshot().circuit_state, CircuitState::Closed);
    }

    #[test]
    fn cooldown_transitions_open_to_half_open() {
        let mut breaker = CircuitBreaker::new(test_config());
        let opened_at = Instant::now();

        for _ in 0..3 {
            breaker.record_failure(opened_at);
        }
        assert_eq!(breaker.update_state(opened_at), CircuitState::Open);

        // Just before the cooldown expires the circuit stays open
        let almost = opened_at + Duration::from_secs(59);
        assert_eq!(breaker.update_state(almost), CircuitState::Open);

        let after = opened_at + Duration::from_secs(60);
        assert_eq!(breaker.update_state(after), CircuitState::HalfOpen);
        assert_eq!(breaker.snapshot().success_count, 0);
    }

    #[test]
    fn three_half_open_successes_close_circuit() {
        let mut breaker = CircuitBreaker::new(test_config());
        let opened_at = Instant::now();

        for _ in 0..3 {
            breaker.record_failure(opened_at);
        }
        breaker.update_state(opened_at + Duration::from_secs(60));
        assert_eq!(breaker.snapshot().circuit_state, CircuitState::HalfOpen);

        breaker.record_success();
        breaker.record_success();
        assert_eq!(breaker.snapshot().circuit_state, CircuitState::HalfOpen);

        breaker.record_success();
        let stats = breaker.snapshot();
        assert_eq!(stats.circuit_state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 0);
    }

    #[test]
    fn half_open_failure_reopens_circuit() {
        let mut breaker = CircuitBreaker::new(test_config());
        let opened_at = Instant::now();

        for _ in 0..3 {
            breaker.record_failure(opened_at);
        }
        breaker.update_state(opened_at + Duration::from_secs(60));

        breaker.record_success();
        breaker.record_failure(opened_at + Duration::from_secs(61));
        assert_eq!(breaker.snapshot().circuit_state, CircuitState::Open);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut breaker = CircuitBreaker::new(test_config());
        let now = Instant::now();

        for _ in 0..3 {
            breaker.record_failure(now);
        }
        assert_eq!(breaker.snapshot().circuit_state, CircuitState::Open);

        breaker.reset();
        let stats = breaker.snapshot();
        assert_eq!(stats.circuit_state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.success_count, 0);
        assert!(stats.last_failure_time.is_none());
    }
}
