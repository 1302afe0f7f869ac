//! Task model: submission requests, lifecycle states, and terminal outcomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Boxed error type task bodies may fail with
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted but not yet gated through dependency tracking
    Pending,
    /// Blocked on at least one incomplete dependency
    Waiting,
    /// All dependencies satisfied, awaiting a free worker
    Ready,
    /// Currently executing on a worker
    Running,
    /// Finished successfully
    Completed,
    /// Exhausted retries with an execution error
    Failed,
    /// Cancelled before completion
    Cancelled,
    /// Exhausted retries with a timeout
    TimedOut,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// Check if this is an active state (task is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if this state still allows cooperative cancellation
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Pending | Self::Waiting | Self::Ready)
    }

    /// Check if this state satisfies dependents' dependency edges
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Waiting => write!(f, "waiting"),
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "waiting" => Ok(Self::Waiting),
            "ready" => Ok(Self::Ready),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "timed_out" => Ok(Self::TimedOut),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Execution context handed to the task body on each attempt
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    /// 1-based attempt number (first run is attempt 1)
    pub attempt: u32,
}

/// Executable body of a task. Implementations carry their own captured
/// state; the scheduler only drives `call` with timeout protection.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn call(&self, ctx: TaskContext) -> Result<Value, TaskError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, TaskError>> + Send,
{
    async fn call(&self, ctx: TaskContext) -> Result<Value, TaskError> {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as a [`TaskHandler`]
pub fn task_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A task submission. Everything except `id` is optional with scheduler
/// defaults applied at submit time.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Unique task id
    pub id: String,

    /// Ordinal priority, lower = more urgent
    pub priority: u32,

    /// Ids of tasks that must complete before this one becomes Ready
    pub depends_on: HashSet<String>,

    /// Estimate used by the shortest-job-first policy; tasks without an
    /// estimate schedule last under that policy
    pub estimated_duration: Option<Duration>,

    /// Deadline used by the earliest-deadline-first policy
    pub deadline: Option<DateTime<Utc>>,

    /// Max run duration per attempt; falls back to the scheduler default
    pub timeout: Option<Duration>,

    /// Retry budget; falls back to the scheduler default
    pub max_retries: Option<u32>,

    /// Submitter slot used by the round-robin policy
    pub submitted_by: Option<String>,
}

impl TaskRequest {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: 100,
            depends_on: HashSet::new(),
            estimated_duration: None,
            deadline: None,
            timeout: None,
            max_retries: None,
            submitted_by: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.depends_on.insert(task_id.into());
        self
    }

    pub fn with_estimated_duration(mut self, estimate: Duration) -> Self {
        self.estimated_duration = Some(estimate);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn submitted_by(mut self, submitter: impl Into<String>) -> Self {
        self.submitted_by = Some(submitter.into());
        self
    }
}

/// Internal per-task record owned by the scheduler for the task's lifetime
#[derive(Debug, Clone)]
pub(crate) struct TaskRecord {
    pub request: TaskRequest,
    pub state: TaskState,
    /// Monotonic submission sequence, the universal tie-breaker
    pub submission_seq: u64,
    pub submitted_at: DateTime<Utc>,
    /// Number of attempts started so far
    pub attempts: u32,
    /// Resolved retry budget
    pub max_retries: u32,
    /// Resolved per-attempt timeout
    pub timeout: Duration,
    /// Backoff gate: not selectable before this instant
    pub not_before: Option<Instant>,
    /// Set when the task last entered Ready, for queue-latency stats
    pub ready_since: Option<Instant>,
    pub started_at: Option<Instant>,
    pub cancel_requested: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl TaskRecord {
    /// Whether the task is selectable by a policy right now
    pub fn is_dispatchable(&self, now: Instant) -> bool {
        self.state == TaskState::Ready && self.not_before.map_or(true, |t| t <= now)
    }
}

/// Terminal outcome delivered to completion callbacks
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub state: TaskState,
    pub attempts: u32,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Point-in-time scheduler counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerProgress {
    pub total: usize,
    pub completed: usize,
    pub running: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Queue-latency aggregate for one policy
#[derive(Debug, Clone, Default, Serialize)]
pub struct LatencyStats {
    pub samples: u64,
    pub total_ms: u64,
    pub max_ms: u64,
}

impl LatencyStats {
    pub fn record(&mut self, latency: Duration) {
        let ms = latency.as_millis() as u64;
        self.samples += 1;
        self.total_ms += ms;
        self.max_ms = self.max_ms.max(ms);
    }

    pub fn average_ms(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.samples as f64
        }
    }
}

/// Cumulative scheduler statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub retried: u64,
    /// Ready-to-running latency aggregated under the active policy's name
    pub per_policy_latency: std::collections::HashMap<String, LatencyStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(TaskState::TimedOut.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Ready.is_terminal());
    }

    #[test]
    fn test_only_completed_satisfies_dependencies() {
        assert!(TaskState::Completed.satisfies_dependencies());
        assert!(!TaskState::Failed.satisfies_dependencies());
        assert!(!TaskState::Cancelled.satisfies_dependencies());
        assert!(!TaskState::TimedOut.satisfies_dependencies());
    }

    #[test]
    fn test_state_round_trips_through_strings() {
        for state in [
            TaskState::Pending,
            TaskState::Waiting,
            TaskState::Ready,
            TaskState::Running,
            TaskState::Completed,
            TaskState::Failed,
            TaskState::Cancelled,
            TaskState::TimedOut,
        ] {
            let parsed: TaskState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert!("bogus".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_request_builder() {
        let request = TaskRequest::new("restart-nginx")
            .with_priority(1)
            .depends_on("drain-traffic")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(2)
            .submitted_by("ops-agent");

        assert_eq!(request.id, "restart-nginx");
        assert_eq!(request.priority, 1);
        assert!(request.depends_on.contains("drain-traffic"));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
        assert_eq!(request.max_retries, Some(2));
        assert_eq!(request.submitted_by.as_deref(), Some("ops-agent"));
    }

    #[test]
    fn test_latency_stats_aggregation() {
        let mut stats = LatencyStats::default();
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(30));
        assert_eq!(stats.samples, 2);
        assert_eq!(stats.max_ms, 30);
        assert!((stats.average_ms() - 20.0).abs() < f64::EPSILON);
    }
}
