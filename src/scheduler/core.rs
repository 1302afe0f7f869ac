//! # Scheduler Core
//!
//! Owns the task registry, ready queue, and a bounded tokio worker pool.
//! A dispatcher loop applies the active [`SchedulingPolicy`] whenever a
//! worker permit is free, enforces per-task timeouts, retries with capped
//! exponential backoff, honors cooperative cancellation, and re-evaluates
//! the [`DependencyTracker`] on every completion.
//!
//! Locking discipline: one `parking_lot::Mutex` guards the in-memory tables
//! and is held only for the duration of an update. No I/O, awaiting, event
//! publishing, or callback invocation happens while it is held.

use crate::config::SchedulerConfig;
use crate::events::EventPublisher;
use crate::scheduler::dependency_tracker::DependencyTracker;
use crate::scheduler::policy::{ReadyTask, SchedulingPolicy, UnknownPolicy};
use crate::scheduler::task::{
    SchedulerProgress, SchedulerStats, TaskContext, TaskHandler, TaskOutcome, TaskRecord,
    TaskRequest, TaskState,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Dispatcher wake-up cadence. The loop is also signaled on submissions and
/// completions; the tick sweeps up backoff-gated retries.
const DISPATCH_TICK: Duration = Duration::from_millis(25);

/// Callback invoked (off-lock) once a task reaches a terminal state
pub type CompletionCallback = Arc<dyn Fn(&TaskOutcome) + Send + Sync>;

/// Errors surfaced synchronously at submission; the task never enters the
/// registry when one is returned
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Duplicate task id: {task_id}")]
    DuplicateTask { task_id: String },

    #[error("Unknown dependency '{dependency}' for task {task_id}")]
    UnknownDependency { task_id: String, dependency: String },

    #[error("Dependency cycle detected for task {task_id}")]
    DependencyCycle { task_id: String },

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

/// Local task scheduler with a bounded concurrent worker pool
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    /// Worker pool bound: one permit per running task
    permits: Arc<Semaphore>,
    work_available: Notify,
    shutting_down: AtomicBool,
    events: EventPublisher,
}

struct SchedulerState {
    tasks: HashMap<String, TaskRecord>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    callbacks: HashMap<String, CompletionCallback>,
    deps: DependencyTracker,
    policy: SchedulingPolicy,
    next_seq: u64,
    stats: SchedulerStats,
}

/// Everything a worker needs, extracted under the lock at dispatch time
struct DispatchedTask {
    id: String,
    attempt: u32,
    timeout: Duration,
    handler: Arc<dyn TaskHandler>,
}

enum FailureKind {
    Errored,
    TimedOut,
}

impl Scheduler {
    /// Create a scheduler and start its dispatcher loop. Must be called
    /// from within a tokio runtime.
    pub fn new(config: SchedulerConfig, events: EventPublisher) -> Result<Self, UnknownPolicy> {
        let policy = SchedulingPolicy::from_config(&config.policy)?;

        info!(
            max_concurrent_tasks = config.max_concurrent_tasks,
            policy = policy.name(),
            "Scheduler initialized"
        );
        if let Some(pool) = &config.cpu_affinity_pool {
            // The core records the pool; pinning worker threads to it is
            // the embedding process's concern.
            info!(cpu_affinity_pool = ?pool, "CPU affinity pool configured");
        }

        let inner = Arc::new(SchedulerInner {
            permits: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
            config,
            state: Mutex::new(SchedulerState {
                tasks: HashMap::new(),
                handlers: HashMap::new(),
                callbacks: HashMap::new(),
                deps: DependencyTracker::new(),
                policy,
                next_seq: 0,
                stats: SchedulerStats::default(),
            }),
            work_available: Notify::new(),
            shutting_down: AtomicBool::new(false),
            events,
        });

        tokio::spawn(SchedulerInner::run_dispatcher(inner.clone()));

        Ok(Self { inner })
    }

    /// Submit a task for execution
    pub fn submit(
        &self,
        request: TaskRequest,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<String, SubmissionError> {
        self.submit_inner(request, handler, None)
    }

    /// Submit a task with a completion callback invoked on its terminal
    /// transition
    pub fn submit_with_callback(
        &self,
        request: TaskRequest,
        handler: Arc<dyn TaskHandler>,
        callback: CompletionCallback,
    ) -> Result<String, SubmissionError> {
        self.submit_inner(request, handler, Some(callback))
    }

    fn submit_inner(
        &self,
        request: TaskRequest,
        handler: Arc<dyn TaskHandler>,
        callback: Option<CompletionCallback>,
    ) -> Result<String, SubmissionError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(SubmissionError::ShuttingDown);
        }

        let task_id = request.id.clone();
        let initial_state;
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            if state.tasks.contains_key(&task_id) {
                return Err(SubmissionError::DuplicateTask { task_id });
            }
            for dep in &request.depends_on {
                if !state.tasks.contains_key(dep) {
                    return Err(SubmissionError::UnknownDependency {
                        task_id,
                        dependency: dep.clone(),
                    });
                }
            }
            if self.inner.config.detect_dependency_cycles
                && state.deps.would_cycle(&task_id, &request.depends_on)
            {
                return Err(SubmissionError::DependencyCycle { task_id });
            }

            // Only Completed dependencies are satisfied. Dependencies that
            // ended Failed/Cancelled/TimedOut stay unmet, so the dependent
            // waits rather than auto-failing.
            let unmet: HashSet<String> = request
                .depends_on
                .iter()
                .filter(|dep| {
                    state
                        .tasks
                        .get(*dep)
                        .map_or(true, |r| !r.state.satisfies_dependencies())
                })
                .cloned()
                .collect();

            let now = Instant::now();
            let mut record = TaskRecord {
                max_retries: request.max_retries.unwrap_or(self.inner.config.max_retries),
                timeout: request
                    .timeout
                    .unwrap_or_else(|| self.inner.config.default_task_timeout()),
                state: TaskState::Pending,
                submission_seq: state.next_seq,
                submitted_at: chrono::Utc::now(),
                attempts: 0,
                not_before: None,
                ready_since: None,
                started_at: None,
                cancel_requested: false,
                result: None,
                error: None,
                request,
            };

            // The dependency gate moves the record out of Pending before it
            // becomes visible to readers or the dispatcher
            initial_state = if unmet.is_empty() {
                TaskState::Ready
            } else {
                TaskState::Waiting
            };
            record.state = initial_state;
            if initial_state == TaskState::Ready {
                record.ready_since = Some(now);
            }
            state.next_seq += 1;
            state.deps.register(&task_id, unmet);
            state.handlers.insert(task_id.clone(), handler);
            if let Some(cb) = callback {
                state.callbacks.insert(task_id.clone(), cb);
            }
            state.tasks.insert(task_id.clone(), record);
            state.stats.submitted += 1;
        }

        self.inner.events.publish_task(
            &task_id,
            "enqueued",
            None,
            json!({ "state": initial_state }),
        );
        if initial_state == TaskState::Ready {
            self.inner.work_available.notify_one();
        }

        debug!(task_id = %task_id, state = %initial_state, "Task submitted");
        Ok(task_id)
    }

    /// Cancel a queued task. Returns `false` (a no-op, not an error) when
    /// the task is unknown, already Running, or terminal; a Running task is
    /// instead marked cancel-requested and reaped when its attempt ends.
    pub fn cancel(&self, task_id: &str) -> bool {
        let callback;
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let Some(record) = state.tasks.get_mut(task_id) else {
                return false;
            };

            if record.state.is_active() {
                record.cancel_requested = true;
                debug!(task_id = %task_id, "Cancellation requested for running task");
                return false;
            }
            if !record.state.is_queued() {
                return false;
            }

            record.state = TaskState::Cancelled;
            state.stats.cancelled += 1;
            state.deps.remove(task_id);
            state.handlers.remove(task_id);
            callback = state
                .callbacks
                .remove(task_id)
                .map(|cb| (cb, outcome_of(record)));
        }

        self.inner
            .events
            .publish_task(task_id, "cancelled", None, json!({}));
        if let Some((cb, outcome)) = callback {
            cb(&outcome);
        }
        true
    }

    /// Point-in-time snapshot of task counts. `failed` includes tasks that
    /// exhausted retries by timing out.
    pub fn get_progress(&self) -> SchedulerProgress {
        let guard = self.inner.state.lock();
        let mut progress = SchedulerProgress {
            total: guard.tasks.len(),
            ..SchedulerProgress::default()
        };
        for record in guard.tasks.values() {
            match record.state {
                TaskState::Completed => progress.completed += 1,
                TaskState::Running => progress.running += 1,
                TaskState::Failed | TaskState::TimedOut => progress.failed += 1,
                TaskState::Cancelled => progress.cancelled += 1,
                _ => {}
            }
        }
        progress
    }

    /// Cumulative statistics since construction
    pub fn get_stats(&self) -> SchedulerStats {
        self.inner.state.lock().stats.clone()
    }

    /// Current state of a task, if it is known to the registry
    pub fn task_state(&self, task_id: &str) -> Option<TaskState> {
        self.inner.state.lock().tasks.get(task_id).map(|r| r.state)
    }

    /// Name of the active scheduling policy
    pub fn policy_name(&self) -> &'static str {
        self.inner.state.lock().policy.name()
    }

    /// Stop accepting new work. With `wait`, blocks until every Running
    /// task finishes or hits its timeout. Queued tasks are left in place.
    pub async fn shutdown(&self, wait: bool) {
        self.inner.shutting_down.store(true, Ordering::Release);
        self.inner.work_available.notify_waiters();
        info!(wait = wait, "Scheduler shutting down");

        if wait {
            // Every worker holds a permit for the duration of its attempt,
            // so acquiring the full pool means the pool has drained.
            let pool_size = self.inner.config.max_concurrent_tasks as u32;
            match self.inner.permits.acquire_many(pool_size).await {
                Ok(_all_permits) => debug!("Worker pool drained"),
                Err(_) => warn!("Worker pool semaphore closed during shutdown"),
            }
        }
    }
}

impl SchedulerInner {
    async fn run_dispatcher(inner: Arc<Self>) {
        let mut tick = tokio::time::interval(DISPATCH_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = inner.work_available.notified() => {}
                _ = tick.tick() => {}
            }
            if inner.shutting_down.load(Ordering::Acquire) {
                break;
            }
            inner.dispatch_ready();
        }
        debug!("Scheduler dispatcher stopped");
    }

    /// Dispatch as many Ready tasks as free permits allow
    fn dispatch_ready(self: &Arc<Self>) {
        loop {
            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                break;
            };
            let Some(dispatch) = self.pick_next() else {
                drop(permit);
                break;
            };
            let inner = self.clone();
            tokio::spawn(async move { inner.run_worker(permit, dispatch).await });
        }
    }

    /// Ask the active policy for the next task and flip it to Running
    fn pick_next(&self) -> Option<DispatchedTask> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let now = Instant::now();

        let task_id = {
            let views: Vec<ReadyTask<'_>> = state
                .tasks
                .values()
                .filter(|r| r.is_dispatchable(now))
                .map(|r| ReadyTask {
                    id: &r.request.id,
                    priority: r.request.priority,
                    estimated_duration: r.request.estimated_duration,
                    deadline: r.request.deadline,
                    submitted_by: r.request.submitted_by.as_deref(),
                    submission_seq: r.submission_seq,
                })
                .collect();
            let idx = state.policy.select(&views)?;
            views[idx].id.to_string()
        };

        let policy_name = state.policy.name();
        let record = state.tasks.get_mut(&task_id)?;
        record.state = TaskState::Running;
        record.attempts += 1;
        record.started_at = Some(now);
        record.not_before = None;
        if let Some(ready_since) = record.ready_since.take() {
            state
                .stats
                .per_policy_latency
                .entry(policy_name.to_string())
                .or_default()
                .record(now.duration_since(ready_since));
        }
        let attempt = record.attempts;
        let task_timeout = record.timeout;
        let handler = state.handlers.get(&task_id).cloned()?;
        drop(guard);

        self.events
            .publish_task(&task_id, "started", None, json!({ "attempt": attempt }));

        Some(DispatchedTask {
            id: task_id,
            attempt,
            timeout: task_timeout,
            handler,
        })
    }

    async fn run_worker(self: Arc<Self>, permit: OwnedSemaphorePermit, dispatch: DispatchedTask) {
        let started = Instant::now();
        let ctx = TaskContext {
            task_id: dispatch.id.clone(),
            attempt: dispatch.attempt,
        };

        let outcome = timeout(dispatch.timeout, dispatch.handler.call(ctx)).await;
        let duration = started.elapsed();

        match outcome {
            Ok(Ok(value)) => self.complete_task(&dispatch.id, value, duration),
            Ok(Err(err)) => {
                self.fail_task(&dispatch.id, err.to_string(), duration, FailureKind::Errored)
            }
            Err(_) => self.fail_task(
                &dispatch.id,
                format!("timed out after {:?}", dispatch.timeout),
                duration,
                FailureKind::TimedOut,
            ),
        }

        drop(permit);
        self.work_available.notify_one();
    }

    fn complete_task(&self, task_id: &str, value: Value, duration: Duration) {
        let callback;
        let released;
        let reaped_as_cancelled;
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(record) = state.tasks.get_mut(task_id) else {
                return;
            };

            reaped_as_cancelled = record.cancel_requested;
            if reaped_as_cancelled {
                // Cancellation honored at natural completion: the result
                // is discarded.
                record.state = TaskState::Cancelled;
                state.stats.cancelled += 1;
                released = Vec::new();
            } else {
                record.state = TaskState::Completed;
                record.result = Some(value);
                state.stats.completed += 1;
                released = state.deps.on_completed(task_id);
            }

            let now = Instant::now();
            for released_id in &released {
                if let Some(dependent) = state.tasks.get_mut(released_id) {
                    if dependent.state == TaskState::Waiting {
                        dependent.state = TaskState::Ready;
                        dependent.ready_since = Some(now);
                    }
                }
            }

            state.handlers.remove(task_id);
            let record = &state.tasks[task_id];
            callback = state
                .callbacks
                .remove(task_id)
                .map(|cb| (cb, outcome_of(record)));
        }

        let status = if reaped_as_cancelled { "cancelled" } else { "completed" };
        self.events.publish_task(
            task_id,
            status,
            Some(duration.as_millis() as u64),
            json!({}),
        );
        for released_id in &released {
            self.events
                .publish_task(released_id, "ready", None, json!({ "released_by": task_id }));
        }
        if let Some((cb, outcome)) = callback {
            cb(&outcome);
        }
        if !released.is_empty() {
            self.work_available.notify_one();
        }
    }

    fn fail_task(&self, task_id: &str, error: String, duration: Duration, kind: FailureKind) {
        let callback;
        let status;
        let mut payload = json!({});
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(record) = state.tasks.get_mut(task_id) else {
                return;
            };

            if record.cancel_requested {
                record.state = TaskState::Cancelled;
                state.stats.cancelled += 1;
                status = "cancelled";
                state.handlers.remove(task_id);
            } else if record.attempts <= record.max_retries {
                // Re-enqueue as Ready behind a backoff gate; the dispatcher
                // tick picks it up once the gate passes.
                let delay = self
                    .config
                    .retry_backoff
                    .delay_for_attempt(record.attempts);
                record.state = TaskState::Ready;
                record.ready_since = Some(Instant::now());
                record.not_before = Some(Instant::now() + delay);
                state.stats.retried += 1;
                status = "retrying";
                payload = json!({
                    "attempt": record.attempts,
                    "reason": match kind { FailureKind::Errored => "errored", FailureKind::TimedOut => "timed_out" },
                    "next_delay_ms": delay.as_millis() as u64,
                    "error": error,
                });
            } else {
                record.state = match kind {
                    FailureKind::Errored => TaskState::Failed,
                    FailureKind::TimedOut => TaskState::TimedOut,
                };
                record.error = Some(error.clone());
                match kind {
                    FailureKind::Errored => state.stats.failed += 1,
                    FailureKind::TimedOut => state.stats.timed_out += 1,
                }
                status = match kind {
                    FailureKind::Errored => "failed",
                    FailureKind::TimedOut => "timed_out",
                };
                payload = json!({ "attempts": record.attempts, "error": error });
                state.handlers.remove(task_id);
            }

            let record = &state.tasks[task_id];
            callback = if record.state.is_terminal() {
                state
                    .callbacks
                    .remove(task_id)
                    .map(|cb| (cb, outcome_of(record)))
            } else {
                None
            };
        }

        self.events
            .publish_task(task_id, status, Some(duration.as_millis() as u64), payload);
        if let Some((cb, outcome)) = callback {
            cb(&outcome);
        }
    }
}

fn outcome_of(record: &TaskRecord) -> TaskOutcome {
    TaskOutcome {
        task_id: record.request.id.clone(),
        state: record.state,
        attempts: record.attempts,
        result: record.result.clone(),
        error: record.error.clone(),
    }
}
