//! Single-action execution with hard timeouts.
//!
//! Timeouts, spawn failures, and non-zero exits are distinct error
//! categories; callers must be able to tell a hung remediation apart from a
//! broken one. On timeout the child is abandoned (`kill_on_drop` reaps it);
//! there is no forced termination beyond that.

use crate::reactor::playbook::{Action, ActionKind, RiskLevel};
use serde::Serialize;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Failure categories for one action execution
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("action timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("failed to spawn action process: {reason}")]
    Spawn { reason: String },

    #[error("action exited with status {code}: {stderr_tail}")]
    NonZeroExit { code: i32, stderr_tail: String },

    #[error("action target is empty")]
    EmptyTarget,
}

/// Terminal status of one action within a playbook run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
    TimedOut,
    /// Not attempted because an earlier high-risk action fast-failed
    Skipped,
}

/// Result record for one action within a playbook run
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub risk: RiskLevel,
    pub status: ActionStatus,
    pub duration_ms: u64,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ActionResult {
    pub(crate) fn skipped(action: &Action) -> Self {
        Self {
            action: action.name.clone(),
            risk: action.risk,
            status: ActionStatus::Skipped,
            duration_ms: 0,
            output: None,
            error: None,
        }
    }
}

/// Execute one action with the given (already clamped) timeout
pub(crate) async fn run_action(action: &Action, action_timeout: Duration) -> ActionResult {
    let started = Instant::now();
    let outcome = match action.kind {
        ActionKind::NoOp => Ok(String::new()),
        ActionKind::ProcessCommand | ActionKind::ScriptedStep => {
            run_process(action, action_timeout).await
        }
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => {
            debug!(action = %action.name, duration_ms, "Action succeeded");
            ActionResult {
                action: action.name.clone(),
                risk: action.risk,
                status: ActionStatus::Succeeded,
                duration_ms,
                output: (!output.is_empty()).then_some(output),
                error: None,
            }
        }
        Err(err) => {
            warn!(action = %action.name, duration_ms, error = %err, "Action failed");
            ActionResult {
                action: action.name.clone(),
                risk: action.risk,
                status: match err {
                    ActionError::Timeout { .. } => ActionStatus::TimedOut,
                    _ => ActionStatus::Failed,
                },
                duration_ms,
                output: None,
                error: Some(err.to_string()),
            }
        }
    }
}

async fn run_process(action: &Action, action_timeout: Duration) -> Result<String, ActionError> {
    let mut cmd = match action.kind {
        ActionKind::ScriptedStep => {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&action.target);
            c
        }
        _ => {
            let mut parts = action.target.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(ActionError::EmptyTarget);
            };
            let mut c = Command::new(program);
            c.args(parts);
            c
        }
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(action_timeout, cmd.output()).await {
        Err(_) => {
            return Err(ActionError::Timeout {
                timeout: action_timeout,
            })
        }
        Ok(Err(io_err)) => {
            return Err(ActionError::Spawn {
                reason: io_err.to_string(),
            })
        }
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ActionError::NonZeroExit {
            code: output.status.code().unwrap_or(-1),
            stderr_tail: stderr.chars().rev().take(200).collect::<String>()
                .chars().rev().collect(),
        })
    }
}
