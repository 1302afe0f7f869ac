//! # Reactor Core
//!
//! Holds the playbook registry, matches incoming fault signals to
//! playbooks, and executes the matched playbook's ordered actions through a
//! bounded worker pool with per-action timeouts. A per-playbook circuit
//! breaker is consulted before each run and updated with the run's
//! aggregate outcome afterwards; a high-risk action failure aborts the rest
//! of the run (fast-fail).
//!
//! The reactor's lock covers only the playbook registry and statistics
//! tables. It is independent of the scheduler's lock and is never held
//! across an await.

use crate::config::ReactorConfig;
use crate::events::EventPublisher;
use crate::reactor::action::{run_action, ActionResult, ActionStatus};
use crate::reactor::playbook::{FaultSignal, Playbook, RiskLevel};
use crate::resilience::{
    Admission, CircuitBreakerConfig, CircuitBreakerManager, CircuitBreakerStatus, CircuitState,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hard errors for programming-contract violations; expected control-flow
/// outcomes (circuit open, partial failure) are statuses, not errors
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("Unknown playbook: {playbook_id}")]
    UnknownPlaybook { playbook_id: String },

    #[error("No playbook matches fault in category '{category}'")]
    NoMatchingPlaybook { category: String },
}

/// Aggregate outcome of one playbook run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every action succeeded
    Success,
    /// At least one action failed, timed out, or was skipped by fast-fail
    PartialFailure,
    /// The breaker rejected the run; nothing was executed
    CircuitOpen,
}

/// Result of `execute_playbook`
#[derive(Debug, Clone, Serialize)]
pub struct PlaybookRunResult {
    pub run_id: Uuid,
    pub playbook_id: String,
    pub status: RunStatus,
    pub action_results: Vec<ActionResult>,
    pub duration_ms: u64,
}

/// Cumulative reactor statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReactorStats {
    pub registered_playbooks: usize,
    pub total_executed: u64,
    pub total_success: u64,
    pub total_failed: u64,
    pub total_rejected: u64,
}

struct PlaybookRegistry {
    by_id: HashMap<String, Playbook>,
    /// First-registration order, which is also fault-match precedence
    order: Vec<String>,
}

/// Automated-remediation engine
#[derive(Clone)]
pub struct Reactor {
    inner: Arc<ReactorInner>,
}

struct ReactorInner {
    config: ReactorConfig,
    playbooks: RwLock<PlaybookRegistry>,
    breakers: CircuitBreakerManager,
    /// Bound on actions in flight across all concurrent runs
    action_permits: Arc<Semaphore>,
    stats: parking_lot::Mutex<ReactorStats>,
    events: EventPublisher,
}

impl Reactor {
    pub fn new(
        config: ReactorConfig,
        breaker_config: CircuitBreakerConfig,
        events: EventPublisher,
    ) -> Self {
        info!(
            max_concurrent_actions = config.max_concurrent_actions,
            action_timeout_seconds = config.action_timeout_seconds,
            "Reactor initialized"
        );
        Self {
            inner: Arc::new(ReactorInner {
                action_permits: Arc::new(Semaphore::new(config.max_concurrent_actions)),
                config,
                playbooks: RwLock::new(PlaybookRegistry {
                    by_id: HashMap::new(),
                    order: Vec::new(),
                }),
                breakers: CircuitBreakerManager::new(breaker_config),
                stats: parking_lot::Mutex::new(ReactorStats::default()),
                events,
            }),
        }
    }

    /// Idempotent upsert by playbook id. Re-registering identical content
    /// is a no-op; changed content replaces the stored playbook in place
    /// without touching its circuit breaker.
    pub fn register_playbook(&self, playbook: Playbook) {
        let playbook_id = playbook.id.clone();
        {
            let mut registry = self.inner.playbooks.write();
            match registry.by_id.get(&playbook_id) {
                Some(existing) if *existing == playbook => {
                    debug!(playbook_id = %playbook_id, "Playbook re-registered unchanged");
                    return;
                }
                Some(_) => {
                    info!(playbook_id = %playbook_id, "Playbook replaced");
                }
                None => {
                    registry.order.push(playbook_id.clone());
                    info!(playbook_id = %playbook_id, actions = playbook.actions.len(), "Playbook registered");
                }
            }
            registry.by_id.insert(playbook_id.clone(), playbook);
        }

        // Breaker exists for the playbook's whole lifetime, starting Closed
        self.inner.breakers.for_playbook(&playbook_id);
        self.inner
            .events
            .publish_playbook(&playbook_id, "registered", None, json!({}));
    }

    /// Find the first registered playbook whose match rule accepts the
    /// signal
    pub fn match_fault(&self, signal: &FaultSignal) -> Option<String> {
        let registry = self.inner.playbooks.read();
        registry
            .order
            .iter()
            .find(|id| {
                registry
                    .by_id
                    .get(*id)
                    .is_some_and(|pb| pb.match_rule.matches(signal))
            })
            .cloned()
    }

    /// Match a fault signal to a playbook and execute it
    pub async fn handle_fault(
        &self,
        signal: &FaultSignal,
    ) -> Result<PlaybookRunResult, ReactorError> {
        let playbook_id =
            self.match_fault(signal)
                .ok_or_else(|| ReactorError::NoMatchingPlaybook {
                    category: signal.category.clone(),
                })?;
        debug!(
            playbook_id = %playbook_id,
            category = %signal.category,
            "Fault matched to playbook"
        );
        self.execute_playbook(&playbook_id).await
    }

    /// Execute a registered playbook's actions in order
    pub async fn execute_playbook(
        &self,
        playbook_id: &str,
    ) -> Result<PlaybookRunResult, ReactorError> {
        let playbook = {
            let registry = self.inner.playbooks.read();
            registry
                .by_id
                .get(playbook_id)
                .cloned()
                .ok_or_else(|| ReactorError::UnknownPlaybook {
                    playbook_id: playbook_id.to_string(),
                })?
        };

        let run_id = Uuid::new_v4();
        let breaker = self.inner.breakers.for_playbook(playbook_id);
        let state_before = breaker.state();
        let admission = breaker.try_acquire();
        self.publish_breaker_transition(playbook_id, state_before, breaker.state());

        if admission == Admission::Rejected {
            // Expected control flow, not a failure of this call: the
            // breaker's failure counter is not touched.
            self.inner.stats.lock().total_rejected += 1;
            self.inner.events.publish_playbook(
                playbook_id,
                "circuit_open",
                None,
                json!({ "run_id": run_id }),
            );
            return Ok(PlaybookRunResult {
                run_id,
                playbook_id: playbook_id.to_string(),
                status: RunStatus::CircuitOpen,
                action_results: Vec::new(),
                duration_ms: 0,
            });
        }

        let started = Instant::now();
        self.inner.events.publish_playbook(
            playbook_id,
            "run_started",
            None,
            json!({ "run_id": run_id, "probe": admission == Admission::Probe }),
        );

        let mut action_results = Vec::with_capacity(playbook.actions.len());
        let mut fast_failed = false;
        let mut any_failed = false;

        for action in &playbook.actions {
            if fast_failed {
                action_results.push(ActionResult::skipped(action));
                continue;
            }

            let action_timeout = action
                .timeout()
                .unwrap_or_else(|| self.inner.config.action_timeout())
                .min(self.inner.config.max_action_timeout());

            // Worker-pool bound across all concurrent runs. The permit is
            // held only for the duration of the action body.
            let result = match self.inner.action_permits.acquire().await {
                Ok(_permit) => run_action(action, action_timeout).await,
                Err(_) => break, // semaphore closed, reactor torn down
            };

            if result.status != ActionStatus::Succeeded {
                any_failed = true;
                if action.risk == RiskLevel::High {
                    // Fast-fail: do not compound the damage
                    warn!(
                        playbook_id = %playbook_id,
                        action = %action.name,
                        "High-risk action failed, aborting remaining actions"
                    );
                    fast_failed = true;
                }
            }
            action_results.push(result);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let status = if any_failed {
            RunStatus::PartialFailure
        } else {
            RunStatus::Success
        };

        // One aggregate signal per run, not per action
        let state_before = breaker.state();
        if any_failed {
            breaker.record_failure();
        } else {
            breaker.record_success();
        }
        self.publish_breaker_transition(playbook_id, state_before, breaker.state());

        {
            let mut stats = self.inner.stats.lock();
            stats.total_executed += 1;
            if any_failed {
                stats.total_failed += 1;
            } else {
                stats.total_success += 1;
            }
        }

        self.inner.events.publish_playbook(
            playbook_id,
            match status {
                RunStatus::Success => "run_succeeded",
                RunStatus::PartialFailure => "run_partial_failure",
                RunStatus::CircuitOpen => "circuit_open",
            },
            Some(duration_ms),
            json!({ "run_id": run_id, "fast_failed": fast_failed }),
        );

        Ok(PlaybookRunResult {
            run_id,
            playbook_id: playbook_id.to_string(),
            status,
            action_results,
            duration_ms,
        })
    }

    fn publish_breaker_transition(
        &self,
        playbook_id: &str,
        before: CircuitState,
        after: CircuitState,
    ) {
        if before == after {
            return;
        }
        let status = match after {
            CircuitState::Open => "opened",
            CircuitState::HalfOpen => "half_opened",
            CircuitState::Closed => "closed",
        };
        self.inner.events.publish_breaker(
            playbook_id,
            status,
            json!({ "previous": before }),
        );
    }

    /// Breaker snapshot for one playbook, if it has ever been registered
    /// or executed
    pub fn circuit_breaker_status(&self, playbook_id: &str) -> Option<CircuitBreakerStatus> {
        self.inner.breakers.status(playbook_id)
    }

    /// Manual override: force a playbook's breaker back to Closed
    pub fn reset_circuit_breaker(&self, playbook_id: &str) -> bool {
        let reset = self.inner.breakers.reset(playbook_id);
        if reset {
            self.inner
                .events
                .publish_breaker(playbook_id, "reset", json!({}));
        }
        reset
    }

    /// Cumulative execution statistics
    pub fn get_stats(&self) -> ReactorStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.registered_playbooks = self.inner.playbooks.read().by_id.len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::playbook::{Action, ActionKind, MatchRule};
    use std::time::Duration;

    fn reactor_with_cooldown(cooldown: Duration) -> Reactor {
        Reactor::new(
            ReactorConfig::default(),
            CircuitBreakerConfig {
                failure_threshold: 3,
                cooldown,
                success_threshold: 2,
            },
            EventPublisher::default(),
        )
    }

    fn noop_playbook(id: &str) -> Playbook {
        Playbook::new(id, id).with_action(Action::new("noop", ActionKind::NoOp, ""))
    }

    #[tokio::test]
    async fn test_execute_unknown_playbook_is_a_hard_error() {
        let reactor = reactor_with_cooldown(Duration::from_secs(30));
        let err = reactor.execute_playbook("ghost").await.unwrap_err();
        assert!(matches!(err, ReactorError::UnknownPlaybook { .. }));
    }

    #[tokio::test]
    async fn test_successful_run_updates_stats_and_breaker() {
        let reactor = reactor_with_cooldown(Duration::from_secs(30));
        reactor.register_playbook(noop_playbook("ok"));

        let result = reactor.execute_playbook("ok").await.unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.action_results.len(), 1);

        let stats = reactor.get_stats();
        assert_eq!(stats.total_executed, 1);
        assert_eq!(stats.total_success, 1);
        assert_eq!(stats.registered_playbooks, 1);

        let breaker = reactor.circuit_breaker_status("ok").unwrap();
        assert_eq!(breaker.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_reregistration_is_idempotent() {
        let reactor = reactor_with_cooldown(Duration::from_secs(30));
        reactor.register_playbook(noop_playbook("idem"));
        reactor.register_playbook(noop_playbook("idem"));

        assert_eq!(reactor.get_stats().registered_playbooks, 1);
        // Match precedence list holds a single entry as well
        let matched = reactor.match_fault(&FaultSignal::new("none", ""));
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn test_fault_matching_uses_registration_order() {
        let reactor = reactor_with_cooldown(Duration::from_secs(30));
        reactor.register_playbook(
            noop_playbook("disk-first").with_match_rule(MatchRule::for_category("disk")),
        );
        reactor.register_playbook(
            noop_playbook("disk-second").with_match_rule(MatchRule::for_category("disk")),
        );

        let signal = FaultSignal::new("disk", "volume full");
        assert_eq!(reactor.match_fault(&signal).as_deref(), Some("disk-first"));

        let result = reactor.handle_fault(&signal).await.unwrap();
        assert_eq!(result.playbook_id, "disk-first");
        assert_eq!(result.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_unmatched_fault_is_an_error() {
        let reactor = reactor_with_cooldown(Duration::from_secs(30));
        reactor.register_playbook(noop_playbook("unmatched"));
        let err = reactor
            .handle_fault(&FaultSignal::new("network", "packet loss"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReactorError::NoMatchingPlaybook { .. }));
    }

    #[tokio::test]
    async fn test_low_risk_failure_continues_to_next_action() {
        let reactor = reactor_with_cooldown(Duration::from_secs(30));
        reactor.register_playbook(
            Playbook::new("lenient", "Lenient")
                .with_action(Action::new("fails", ActionKind::ScriptedStep, "exit 1"))
                .with_action(Action::new("runs", ActionKind::NoOp, "")),
        );

        let result = reactor.execute_playbook("lenient").await.unwrap();
        assert_eq!(result.status, RunStatus::PartialFailure);
        assert_eq!(result.action_results[0].status, ActionStatus::Failed);
        // Low-risk failure records a partial failure but keeps going
        assert_eq!(result.action_results[1].status, ActionStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_reset_reopens_a_tripped_breaker() {
        let reactor = reactor_with_cooldown(Duration::from_secs(3600));
        reactor.register_playbook(
            Playbook::new("flaky", "Flaky")
                .with_action(Action::new("fail", ActionKind::ScriptedStep, "exit 1")),
        );

        for _ in 0..3 {
            let result = reactor.execute_playbook("flaky").await.unwrap();
            assert_eq!(result.status, RunStatus::PartialFailure);
        }
        let rejected = reactor.execute_playbook("flaky").await.unwrap();
        assert_eq!(rejected.status, RunStatus::CircuitOpen);

        assert!(reactor.reset_circuit_breaker("flaky"));
        let after_reset = reactor.execute_playbook("flaky").await.unwrap();
        assert_eq!(after_reset.status, RunStatus::PartialFailure);
        assert!(!reactor.reset_circuit_breaker("never-registered"));
    }
}
