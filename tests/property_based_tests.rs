//! Property-based tests for scheduling and resilience invariants.

use proptest::prelude::*;
use remedy_core::config::{RetryBackoffConfig, SchedulerConfig};
use remedy_core::events::EventPublisher;
use remedy_core::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use remedy_core::scheduler::{
    task_fn, ReadyTask, Scheduler, SchedulingPolicy, TaskRequest, TaskState,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Dependency lists for a DAG of `n` tasks: task `i` may only depend on
/// tasks submitted before it, so cycles are impossible by construction
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..8).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    prop::collection::vec(0..i, 0..=i.min(3)).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

fn ready_set_strategy() -> impl Strategy<Value = Vec<(u32, Option<u64>)>> {
    // (priority, estimated_duration_ms)
    prop::collection::vec((0u32..10, prop::option::of(1u64..5000)), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every task in a random DAG completes, and no task starts before all
    /// of its dependencies have completed
    #[test]
    fn prop_dag_dependencies_complete_before_dependents_start(deps in dag_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let mut config = SchedulerConfig::default();
            config.max_concurrent_tasks = 3;
            let scheduler = Scheduler::new(config, EventPublisher::default()).unwrap();
            let violation = Arc::new(AtomicBool::new(false));

            let n = deps.len();
            for (i, dep_ids) in deps.iter().enumerate() {
                let mut request = TaskRequest::new(format!("task-{i}"));
                for dep in dep_ids {
                    request = request.depends_on(format!("task-{dep}"));
                }

                let probe = scheduler.clone();
                let violation = violation.clone();
                let dep_names: Vec<String> =
                    dep_ids.iter().map(|d| format!("task-{d}")).collect();
                scheduler
                    .submit(
                        request,
                        task_fn(move |_ctx| {
                            let probe = probe.clone();
                            let violation = violation.clone();
                            let dep_names = dep_names.clone();
                            async move {
                                for dep in &dep_names {
                                    if probe.task_state(dep) != Some(TaskState::Completed) {
                                        violation.store(true, Ordering::SeqCst);
                                    }
                                }
                                Ok(json!(null))
                            }
                        }),
                    )
                    .unwrap();
            }

            for _ in 0..400 {
                if scheduler.get_progress().completed == n {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            prop_assert_eq!(scheduler.get_progress().completed, n);
            prop_assert!(!violation.load(Ordering::SeqCst));
            Ok(())
        })?;
    }

    /// The priority policy always selects the lowest priority value, with
    /// submission order breaking ties
    #[test]
    fn prop_priority_policy_selects_most_urgent(tasks in ready_set_strategy()) {
        let ids: Vec<String> = (0..tasks.len()).map(|i| format!("t{i}")).collect();
        let ready: Vec<ReadyTask<'_>> = tasks
            .iter()
            .enumerate()
            .map(|(i, (priority, estimate))| ReadyTask {
                id: &ids[i],
                priority: *priority,
                estimated_duration: estimate.map(Duration::from_millis),
                deadline: None,
                submitted_by: None,
                submission_seq: i as u64,
            })
            .collect();

        let mut policy = SchedulingPolicy::Priority;
        let selected = policy.select(&ready).unwrap();
        let best = &ready[selected];
        for candidate in &ready {
            prop_assert!(
                (best.priority, best.submission_seq)
                    <= (candidate.priority, candidate.submission_seq)
            );
        }
    }

    /// Shortest-job selection never prefers a task with an estimate over a
    /// shorter-estimated one, and unestimated tasks lose to estimated ones
    #[test]
    fn prop_shortest_job_policy_selects_shortest_estimate(tasks in ready_set_strategy()) {
        let ids: Vec<String> = (0..tasks.len()).map(|i| format!("t{i}")).collect();
        let ready: Vec<ReadyTask<'_>> = tasks
            .iter()
            .enumerate()
            .map(|(i, (priority, estimate))| ReadyTask {
                id: &ids[i],
                priority: *priority,
                estimated_duration: estimate.map(Duration::from_millis),
                deadline: None,
                submitted_by: None,
                submission_seq: i as u64,
            })
            .collect();

        let mut policy = SchedulingPolicy::ShortestJob;
        let selected = policy.select(&ready).unwrap();
        let best_key = (
            ready[selected].estimated_duration.unwrap_or(Duration::MAX),
            ready[selected].submission_seq,
        );
        for candidate in &ready {
            let key = (
                candidate.estimated_duration.unwrap_or(Duration::MAX),
                candidate.submission_seq,
            );
            prop_assert!(best_key <= key);
        }
    }

    /// A breaker is open exactly when it has absorbed at least
    /// `failure_threshold` consecutive failures with no success in between
    #[test]
    fn prop_breaker_opens_exactly_at_threshold(
        failures in 0u32..8,
        threshold in 1u32..5,
    ) {
        let breaker = CircuitBreaker::new(
            "prop".to_string(),
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(3600),
                success_threshold: 2,
            },
        );

        for _ in 0..failures {
            if breaker.try_acquire().is_admitted() {
                breaker.record_failure();
            }
        }

        let expected = if failures >= threshold {
            CircuitState::Open
        } else {
            CircuitState::Closed
        };
        prop_assert_eq!(breaker.state(), expected);
    }

    /// Backoff delays are non-decreasing across attempts and never exceed
    /// the configured cap
    #[test]
    fn prop_backoff_is_monotonic_and_capped(
        base in 1u64..2000,
        max in 2000u64..60_000,
        attempts in 1u32..20,
    ) {
        let backoff = RetryBackoffConfig {
            base_delay_ms: base,
            multiplier: 2.0,
            max_delay_ms: max,
            jitter: false,
        };

        let mut previous = Duration::ZERO;
        for attempt in 1..=attempts {
            let delay = backoff.delay_for_attempt(attempt);
            prop_assert!(delay >= previous);
            prop_assert!(delay <= Duration::from_millis(max));
            previous = delay;
        }
    }
}
