//! # Remedy Core Configuration System
//!
//! Explicit, validated configuration for the scheduler and reactor. All
//! tunables live in serde structs with production defaults; values can be
//! overridden from a YAML/TOML file or `REMEDY_`-prefixed environment
//! variables through [`RemedyConfig::load`].
//!
//! The core consumes this surface but does not own it: embedders are free to
//! construct the structs directly instead of going through the loader.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::ConfigurationError;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RemedyConfig {
    /// Task scheduling configuration
    pub scheduler: SchedulerConfig,

    /// Remediation reactor configuration
    pub reactor: ReactorConfig,

    /// Per-playbook circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerSettings,

    /// Event sink configuration
    pub events: EventsConfig,
}

impl RemedyConfig {
    /// Validate cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.scheduler.max_concurrent_tasks == 0 {
            return Err(ConfigurationError::Invalid {
                message: "scheduler.max_concurrent_tasks must be greater than 0".to_string(),
            });
        }
        if self.reactor.max_concurrent_actions == 0 {
            return Err(ConfigurationError::Invalid {
                message: "reactor.max_concurrent_actions must be greater than 0".to_string(),
            });
        }
        if self.reactor.action_timeout_seconds > self.reactor.max_action_timeout_seconds {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "reactor.action_timeout_seconds ({}) exceeds max_action_timeout_seconds ({})",
                    self.reactor.action_timeout_seconds, self.reactor.max_action_timeout_seconds
                ),
            });
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigurationError::Invalid {
                message: "circuit_breaker.failure_threshold must be greater than 0".to_string(),
            });
        }
        if self.circuit_breaker.half_open_success_threshold == 0 {
            return Err(ConfigurationError::Invalid {
                message: "circuit_breaker.half_open_success_threshold must be greater than 0"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Task scheduling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks running simultaneously
    pub max_concurrent_tasks: usize,

    /// Default per-task timeout when the submission does not set one
    pub default_task_timeout_seconds: u64,

    /// Default retry budget when the submission does not set one
    pub max_retries: u32,

    /// Retry backoff schedule
    pub retry_backoff: RetryBackoffConfig,

    /// Active scheduling policy
    pub policy: PolicyConfig,

    /// Optional CPU indices workers may be pinned to. The core records and
    /// logs this pool; actual pinning is the embedding process's concern.
    pub cpu_affinity_pool: Option<Vec<usize>>,

    /// Reject submissions whose dependency set closes a cycle. Off by
    /// default: undetected cycles starve rather than fail.
    pub detect_dependency_cycles: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            default_task_timeout_seconds: 300,
            max_retries: 3,
            retry_backoff: RetryBackoffConfig::default(),
            policy: PolicyConfig::default(),
            cpu_affinity_pool: None,
            detect_dependency_cycles: false,
        }
    }
}

impl SchedulerConfig {
    pub fn default_task_timeout(&self) -> Duration {
        Duration::from_secs(self.default_task_timeout_seconds)
    }
}

/// Retry backoff schedule: exponential with a cap and optional jitter
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryBackoffConfig {
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,

    /// Exponential backoff multiplier
    pub multiplier: f64,

    /// Cap on any single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryBackoffConfig {
    /// Delay before retry attempt `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(exponent as i32);
        let capped = raw.min(self.max_delay_ms as f64);
        let with_jitter = if self.jitter {
            capped * (1.0 + fastrand::f64() * 0.1)
        } else {
            capped
        };
        Duration::from_millis(with_jitter as u64)
    }
}

/// Active scheduling policy selection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// One of: fifo, shortest_job, round_robin, earliest_deadline, priority, hybrid
    pub name: String,

    /// Hybrid only: tasks at or below this priority value (more urgent) use
    /// priority ordering
    pub hybrid_priority_threshold: u32,

    /// Hybrid only: policy name for tasks below the threshold
    pub hybrid_fallback: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            name: "fifo".to_string(),
            hybrid_priority_threshold: 1,
            hybrid_fallback: "fifo".to_string(),
        }
    }
}

/// Remediation reactor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReactorConfig {
    /// Bound on actions executing simultaneously across all playbook runs
    pub max_concurrent_actions: usize,

    /// Default per-action timeout
    pub action_timeout_seconds: u64,

    /// Hard ceiling applied to any per-action timeout override
    pub max_action_timeout_seconds: u64,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_actions: 4,
            action_timeout_seconds: 10,
            max_action_timeout_seconds: 120,
        }
    }
}

impl ReactorConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_seconds)
    }

    pub fn max_action_timeout(&self) -> Duration {
        Duration::from_secs(self.max_action_timeout_seconds)
    }
}

/// Circuit breaker thresholds shared by all playbook breakers
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before a Closed breaker opens
    pub failure_threshold: u32,

    /// Cooldown before an Open breaker admits a probe
    pub cooldown_seconds: u64,

    /// Consecutive probe successes before a HalfOpen breaker closes
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_seconds: 30,
            half_open_success_threshold: 2,
        }
    }
}

impl CircuitBreakerSettings {
    /// Convert the serde-facing seconds representation into the
    /// duration-based config the resilience module consumes
    pub fn breaker_config(&self) -> crate::resilience::CircuitBreakerConfig {
        crate::resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_seconds),
            success_threshold: self.half_open_success_threshold,
        }
    }
}

/// Event sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity for the lifecycle event sink
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}
