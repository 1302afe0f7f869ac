//! Playbook model: named remediation procedures, their ordered actions,
//! and the match rules that bind fault signals to them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Risk classification for one remediation action. High-risk action
/// failure aborts the remaining actions of the same run (fast-fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// How an action's `target` is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// `target` is a program plus arguments, executed directly
    ProcessCommand,
    /// `target` is a shell snippet, executed via `sh -c`
    ScriptedStep,
    /// Executes nothing and always succeeds
    NoOp,
}

/// One executable step within a playbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    /// Opaque command/script reference, interpreted per `kind`
    pub target: String,
    pub risk: RiskLevel,
    /// Per-action timeout override; the reactor clamps it to its ceiling
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Action {
    pub fn new(name: impl Into<String>, kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            risk: RiskLevel::Low,
            timeout_seconds: None,
        }
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

/// Predicate binding fault signals to a playbook: a signal matches when its
/// category equals one of `categories`, or its message contains one of
/// `keywords` (case-insensitive)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl MatchRule {
    pub fn for_category(category: impl Into<String>) -> Self {
        Self {
            categories: vec![category.into()],
            keywords: Vec::new(),
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn matches(&self, signal: &FaultSignal) -> bool {
        if self
            .categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&signal.category))
        {
            return true;
        }
        let message = signal.message.to_lowercase();
        self.keywords
            .iter()
            .any(|k| message.contains(&k.to_lowercase()))
    }
}

/// An incoming fault report the reactor may remediate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultSignal {
    /// Coarse classification, e.g. `disk`, `memory`, `service`
    pub category: String,
    /// Free-form detail used for keyword matching
    pub message: String,
    /// Optional reporting component
    #[serde(default)]
    pub source: Option<String>,
}

impl FaultSignal {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            source: None,
        }
    }
}

/// A named, ordered remediation procedure. Registered once at startup and
/// immutable thereafter except by explicit re-registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub id: String,
    pub name: String,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub match_rule: MatchRule,
}

impl Playbook {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            actions: Vec::new(),
            match_rule: MatchRule::default(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_match_rule(mut self, rule: MatchRule) -> Self {
        self.match_rule = rule;
        self
    }
}
