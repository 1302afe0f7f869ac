//! # Scheduling Policies
//!
//! Pure ordering strategies over the Ready set. Each policy defines a total
//! order; equally-ranked tasks always fall back to submission order, so
//! selection is stable under every policy.

use crate::config::PolicyConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Read-only view of one Ready task, decoupled from registry internals
#[derive(Debug, Clone)]
pub struct ReadyTask<'a> {
    pub id: &'a str,
    pub priority: u32,
    pub estimated_duration: Option<Duration>,
    pub deadline: Option<DateTime<Utc>>,
    pub submitted_by: Option<&'a str>,
    pub submission_seq: u64,
}

/// The closed set of ordering strategies, selected at scheduler construction
#[derive(Debug, Clone)]
pub enum SchedulingPolicy {
    /// Submission order
    Fifo,
    /// `estimated_duration` ascending; tasks without an estimate go last
    ShortestJob,
    /// Rotate over distinct submitter slots, one pick per tick
    RoundRobin { cursor: usize },
    /// `deadline` ascending; tasks without a deadline go last
    EarliestDeadline,
    /// `priority` ascending (lower = more urgent)
    Priority,
    /// Priority ordering at or above an urgency threshold, fallback below it
    Hybrid {
        priority_threshold: u32,
        fallback: Box<SchedulingPolicy>,
    },
}

/// Error for unrecognized policy names in configuration
#[derive(Debug, thiserror::Error)]
#[error("Unknown scheduling policy: {name}")]
pub struct UnknownPolicy {
    pub name: String,
}

impl SchedulingPolicy {
    /// Build the active policy from configuration
    pub fn from_config(config: &PolicyConfig) -> Result<Self, UnknownPolicy> {
        let policy = match config.name.as_str() {
            "hybrid" => {
                let fallback = Self::base_policy(&config.hybrid_fallback)?;
                Self::Hybrid {
                    priority_threshold: config.hybrid_priority_threshold,
                    fallback: Box::new(fallback),
                }
            }
            name => Self::base_policy(name)?,
        };
        Ok(policy)
    }

    fn base_policy(name: &str) -> Result<Self, UnknownPolicy> {
        match name {
            "fifo" => Ok(Self::Fifo),
            "shortest_job" => Ok(Self::ShortestJob),
            "round_robin" => Ok(Self::RoundRobin { cursor: 0 }),
            "earliest_deadline" => Ok(Self::EarliestDeadline),
            "priority" => Ok(Self::Priority),
            other => Err(UnknownPolicy {
                name: other.to_string(),
            }),
        }
    }

    /// Stable name used for per-policy statistics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::ShortestJob => "shortest_job",
            Self::RoundRobin { .. } => "round_robin",
            Self::EarliestDeadline => "earliest_deadline",
            Self::Priority => "priority",
            Self::Hybrid { .. } => "hybrid",
        }
    }

    /// Select the next task from the Ready set, returning an index into
    /// `ready`. Round-robin advances its cursor on every successful pick.
    pub fn select(&mut self, ready: &[ReadyTask<'_>]) -> Option<usize> {
        if ready.is_empty() {
            return None;
        }

        match self {
            Self::Fifo => min_by_key(ready, |t| t.submission_seq),

            Self::ShortestJob => min_by_key(ready, |t| {
                (
                    t.estimated_duration.unwrap_or(Duration::MAX),
                    t.submission_seq,
                )
            }),

            Self::RoundRobin { cursor } => {
                // Distinct submitter slots in deterministic order; tasks
                // without a submitter share one slot.
                let mut slots: Vec<&str> = ready
                    .iter()
                    .map(|t| t.submitted_by.unwrap_or(""))
                    .collect();
                slots.sort_unstable();
                slots.dedup();

                let slot = slots[*cursor % slots.len()];
                *cursor = cursor.wrapping_add(1);

                min_by_key_filtered(
                    ready,
                    |t| t.submitted_by.unwrap_or("") == slot,
                    |t| t.submission_seq,
                )
            }

            Self::EarliestDeadline => min_by_key(ready, |t| {
                // None sorts after every concrete deadline
                (t.deadline.is_none(), t.deadline, t.submission_seq)
            }),

            Self::Priority => min_by_key(ready, |t| (t.priority, t.submission_seq)),

            Self::Hybrid {
                priority_threshold,
                fallback,
            } => {
                let urgent_exists = ready.iter().any(|t| t.priority <= *priority_threshold);
                if urgent_exists {
                    min_by_key_filtered(
                        ready,
                        |t| t.priority <= *priority_threshold,
                        |t| (t.priority, t.submission_seq),
                    )
                } else {
                    fallback.select(ready)
                }
            }
        }
    }
}

fn min_by_key<K: Ord>(ready: &[ReadyTask<'_>], key: impl Fn(&ReadyTask<'_>) -> K) -> Option<usize> {
    min_by_key_filtered(ready, |_| true, key)
}

fn min_by_key_filtered<K: Ord>(
    ready: &[ReadyTask<'_>],
    filter: impl Fn(&ReadyTask<'_>) -> bool,
    key: impl Fn(&ReadyTask<'_>) -> K,
) -> Option<usize> {
    ready
        .iter()
        .enumerate()
        .filter(|(_, t)| filter(t))
        .min_by_key(|(_, t)| key(t))
        .map(|(idx, _)| idx)
}
