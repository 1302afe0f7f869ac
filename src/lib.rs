//! # Remedy Core
//!
//! Local task scheduling and automated remediation for a single process.
//! No external services: state lives in memory, work runs on a bounded
//! tokio pool, and operators observe the system through structured logs
//! and a broadcast event stream.
//!
//! ## Architecture
//!
//! Two engines share one ambient stack (config, events, logging, errors):
//!
//! - **Scheduler** ([`scheduler`]) - priority/dependency-aware task
//!   execution with interchangeable ordering policies, retry with capped
//!   exponential backoff, per-task timeouts, and cooperative cancellation
//! - **Reactor** ([`reactor`]) - playbook registry and fault-signal
//!   matching, executing ordered remediation actions with fast-fail on
//!   high-risk failures
//! - **Resilience** ([`resilience`]) - per-playbook circuit breakers that
//!   take chronically failing remediations out of rotation for a cooldown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use remedy_core::config::RemedyConfig;
//! use remedy_core::events::EventPublisher;
//! use remedy_core::scheduler::{task_fn, Scheduler, TaskRequest};
//! use serde_json::json;
//!
//! # async fn example() -> remedy_core::Result<()> {
//! let config = RemedyConfig::default();
//! let events = EventPublisher::new(config.events.channel_capacity);
//! let scheduler = Scheduler::new(config.scheduler, events)?;
//!
//! scheduler.submit(
//!     TaskRequest::new("compact-storage").with_priority(2),
//!     task_fn(|_ctx| async move { Ok(json!({"reclaimed_mb": 512})) }),
//! )?;
//!
//! scheduler.shutdown(true).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod reactor;
pub mod resilience;
pub mod scheduler;

pub use config::RemedyConfig;
pub use error::{RemedyError, Result};
pub use events::{CoreEvent, EventPublisher};
pub use reactor::{FaultSignal, Playbook, PlaybookRunResult, Reactor, RunStatus};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use scheduler::{Scheduler, TaskRequest, TaskState};
