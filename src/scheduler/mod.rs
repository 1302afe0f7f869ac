//! # Task Scheduler
//!
//! Priority/dependency-aware local task scheduling over a bounded tokio
//! worker pool.
//!
//! ## Architecture
//!
//! - [`task`] - Task model, lifecycle states, and executable handler trait
//! - [`policy`] - Interchangeable ordering strategies over the Ready set
//! - [`dependency_tracker`] - Blocked-task adjacency bookkeeping
//! - [`core`] - The scheduler itself: registry, dispatcher loop, workers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use remedy_core::config::SchedulerConfig;
//! use remedy_core::events::EventPublisher;
//! use remedy_core::scheduler::{Scheduler, TaskRequest, task_fn};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new(SchedulerConfig::default(), EventPublisher::default())?;
//!
//! scheduler.submit(
//!     TaskRequest::new("rotate-logs").with_priority(1),
//!     task_fn(|ctx| async move {
//!         // task body
//!         Ok(json!({ "task": ctx.task_id }))
//!     }),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod dependency_tracker;
pub mod policy;
pub mod task;

pub use self::core::{CompletionCallback, Scheduler, SubmissionError};
pub use dependency_tracker::DependencyTracker;
pub use policy::{ReadyTask, SchedulingPolicy, UnknownPolicy};
pub use task::{
    task_fn, LatencyStats, SchedulerProgress, SchedulerStats, TaskContext, TaskError, TaskHandler,
    TaskOutcome, TaskRequest, TaskState,
};
