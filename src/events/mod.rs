//! # Event System
//!
//! Write-only lifecycle event sink for the scheduler and reactor. Every state
//! transition (task enqueued/started/completed, breaker opened/closed,
//! playbook run outcomes) is published as a structured [`CoreEvent`] on an
//! in-process broadcast channel. The core never reads these events back;
//! external transports subscribe and forward them.

pub mod publisher;

pub use publisher::{CoreEvent, EventCategory, EventPublisher};
