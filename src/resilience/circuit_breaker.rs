//! # Circuit Breaker Implementation
//!
//! Fault isolation for remediation playbooks, following the classic circuit
//! breaker pattern with three states: Closed (normal operation), Open
//! (failing fast), and Half-Open (testing recovery).
//!
//! Unlike a call-wrapping breaker, this one exposes a gate-check/report
//! pair: callers ask [`CircuitBreaker::try_acquire`] before executing and
//! report the aggregate outcome afterwards. All transitions and reads go
//! through one mutex per breaker, so a probe admission and its report
//! cannot interleave with a second probe.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - a single probe call is allowed
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

/// Configuration parameters for one breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before a Closed breaker opens
    pub failure_threshold: u32,
    /// Cooldown before an Open breaker admits a probe
    pub cooldown: Duration,
    /// Consecutive probe successes before a HalfOpen breaker closes
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Result of asking the breaker for admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed: execute normally
    Allowed,
    /// HalfOpen: execute as the single in-flight probe
    Probe,
    /// Open (or a probe already in flight): do not execute
    Rejected,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Point-in-time breaker snapshot for introspection APIs
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    /// How long the breaker has been open, when it is
    pub open_for_ms: Option<u64>,
    pub total_executions: u64,
    pub total_rejections: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    /// True while a HalfOpen probe has been admitted but not yet reported
    probe_in_flight: bool,
    total_executions: u64,
    total_rejections: u64,
}

/// Core circuit breaker with mutex-guarded state management
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and events
    name: String,
    config: CircuitBreakerConfig,
    inner: parking_lot::Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            cooldown_seconds = config.cooldown.as_secs(),
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: parking_lot::Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
                probe_in_flight: false,
                total_executions: 0,
                total_rejections: 0,
            }),
        }
    }

    /// Get current circuit state. An Open breaker whose cooldown has
    /// elapsed still reads Open until the next admission check moves it.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask for admission. Open breakers whose cooldown elapsed transition
    /// to HalfOpen and admit the caller as the single probe.
    pub fn try_acquire(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.total_executions += 1;
                Admission::Allowed
            }
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.probe_in_flight = true;
                    inner.total_executions += 1;
                    info!(
                        component = %self.name,
                        success_threshold = self.config.success_threshold,
                        "🟡 Circuit breaker half-open (testing recovery)"
                    );
                    Admission::Probe
                } else {
                    inner.total_rejections += 1;
                    debug!(component = %self.name, "Circuit open, rejecting call");
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    // Only one in-flight probe at a time
                    inner.total_rejections += 1;
                    Admission::Rejected
                } else {
                    inner.probe_in_flight = true;
                    inner.total_executions += 1;
                    Admission::Probe
                }
            }
        }
    }

    /// Record a successful execution
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                // Any success clears the failure count, not just the one
                // that closes the circuit
                inner.consecutive_failures = 0;
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                    info!(component = %self.name, "🟢 Circuit breaker closed (recovered)");
                }
            }
            CircuitState::Open => {
                warn!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    /// Record a failed execution
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.probe_in_flight = false;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.open_locked(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during recovery testing reopens immediately
                self.open_locked(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    /// Manual override: force Closed and clear all counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_successes = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
        warn!(component = %self.name, "🚨 Circuit breaker manually reset to closed");
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        self.open_locked(&mut inner);
    }

    /// Get a point-in-time status snapshot
    pub fn status(&self) -> CircuitBreakerStatus {
        let inner = self.inner.lock();
        CircuitBreakerStatus {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            half_open_successes: inner.half_open_successes,
            open_for_ms: inner.opened_at.map(|t| t.elapsed().as_millis() as u64),
            total_executions: inner.total_executions,
            total_rejections: inner.total_rejections,
        }
    }

    fn open_locked(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.half_open_successes = 0;
        error!(
            component = %self.name,
            consecutive_failures = inner.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            cooldown_seconds = self.config.cooldown.as_secs(),
            "🔴 Circuit breaker opened (failing fast)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, cooldown: Duration, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test".to_string(),
            CircuitBreakerConfig {
                failure_threshold,
                cooldown,
                success_threshold,
            },
        )
    }

    #[test]
    fn test_starts_closed_and_allows_calls() {
        let circuit = breaker(3, Duration::from_millis(100), 2);
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.try_acquire(), Admission::Allowed);
        circuit.record_success();
        assert_eq!(circuit.status().total_executions, 1);
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let circuit = breaker(3, Duration::from_secs(30), 2);

        for _ in 0..2 {
            assert_eq!(circuit.try_acquire(), Admission::Allowed);
            circuit.record_failure();
            assert_eq!(circuit.state(), CircuitState::Closed);
        }

        assert_eq!(circuit.try_acquire(), Admission::Allowed);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);

        // Open rejects without executing
        assert_eq!(circuit.try_acquire(), Admission::Rejected);
        assert_eq!(circuit.status().total_rejections, 1);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let circuit = breaker(3, Duration::from_secs(30), 2);
        circuit.try_acquire();
        circuit.record_failure();
        circuit.try_acquire();
        circuit.record_failure();
        circuit.try_acquire();
        circuit.record_success();
        assert_eq!(circuit.status().consecutive_failures, 0);

        // Needs a fresh run of three failures to open
        circuit.try_acquire();
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_recovery_through_half_open() {
        let circuit = breaker(1, Duration::from_millis(20), 2);
        circuit.try_acquire();
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));

        // First post-cooldown call is the probe
        assert_eq!(circuit.try_acquire(), Admission::Probe);
        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        // Second consecutive probe success closes
        assert_eq!(circuit.try_acquire(), Admission::Probe);
        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.status().consecutive_failures, 0);
    }

    #[test]
    fn test_probe_success_clears_failure_count_before_closing() {
        let circuit = breaker(1, Duration::from_millis(10), 2);
        circuit.try_acquire();
        circuit.record_failure();
        assert_eq!(circuit.status().consecutive_failures, 1);
        std::thread::sleep(Duration::from_millis(20));

        // One probe success is below the close threshold, yet the failure
        // count is already cleared
        assert_eq!(circuit.try_acquire(), Admission::Probe);
        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        assert_eq!(circuit.status().consecutive_failures, 0);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let circuit = breaker(1, Duration::from_millis(20), 2);
        circuit.try_acquire();
        circuit.record_failure();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(circuit.try_acquire(), Admission::Probe);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);

        // Fresh opened_at: still rejecting before the new cooldown elapses
        assert_eq!(circuit.try_acquire(), Admission::Rejected);
    }

    #[test]
    fn test_only_one_probe_in_flight() {
        let circuit = breaker(1, Duration::from_millis(10), 2);
        circuit.try_acquire();
        circuit.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(circuit.try_acquire(), Admission::Probe);
        // Probe outstanding: concurrent callers are rejected
        assert_eq!(circuit.try_acquire(), Admission::Rejected);
        circuit.record_success();
        // Probe reported: the next caller may probe again
        assert_eq!(circuit.try_acquire(), Admission::Probe);
    }

    #[test]
    fn test_manual_reset_and_force_open() {
        let circuit = breaker(1, Duration::from_secs(30), 2);
        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);
        assert_eq!(circuit.try_acquire(), Admission::Rejected);

        circuit.reset();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.try_acquire(), Admission::Allowed);
        assert_eq!(circuit.status().consecutive_failures, 0);
    }
}
