//! # Resilience Module
//!
//! Fault isolation for remediation paths. Each playbook gets its own
//! circuit breaker so a remediation that keeps failing is disabled for a
//! cooldown period and re-admitted gradually instead of being retried in a
//! tight loop.
//!
//! ## Usage
//!
//! ```rust
//! use remedy_core::resilience::{Admission, CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new("disk-cleanup".to_string(), CircuitBreakerConfig::default());
//!
//! if breaker.try_acquire().is_admitted() {
//!     // run the playbook, then report the aggregate outcome
//!     breaker.record_success();
//! }
//! ```

pub mod circuit_breaker;
pub mod manager;

pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, CircuitState,
};
pub use manager::CircuitBreakerManager;
