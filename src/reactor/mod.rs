//! # Reactor Module
//!
//! Automated remediation: playbooks describe ordered corrective actions for
//! known fault categories, and the reactor matches incoming fault signals
//! to them and executes the actions through a bounded pool with per-action
//! timeouts and per-playbook circuit breaking.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use remedy_core::config::ReactorConfig;
//! use remedy_core::events::EventPublisher;
//! use remedy_core::reactor::{Action, ActionKind, FaultSignal, MatchRule, Playbook, Reactor};
//! use remedy_core::resilience::CircuitBreakerConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reactor = Reactor::new(
//!     ReactorConfig::default(),
//!     CircuitBreakerConfig::default(),
//!     EventPublisher::default(),
//! );
//!
//! reactor.register_playbook(
//!     Playbook::new("disk-cleanup", "Disk cleanup")
//!         .with_match_rule(MatchRule::for_category("disk"))
//!         .with_action(Action::new("rotate-logs", ActionKind::ScriptedStep, "logrotate -f")),
//! );
//!
//! let result = reactor
//!     .handle_fault(&FaultSignal::new("disk", "volume 92% full"))
//!     .await?;
//! println!("run {} finished: {:?}", result.run_id, result.status);
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod core;
pub mod playbook;

pub use action::{ActionError, ActionResult, ActionStatus};
pub use self::core::{PlaybookRunResult, Reactor, ReactorError, ReactorStats, RunStatus};
pub use playbook::{Action, ActionKind, FaultSignal, MatchRule, Playbook, RiskLevel};
