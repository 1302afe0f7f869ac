//! # Dependency Tracker
//!
//! Explicit adjacency bookkeeping for blocked tasks: blocked id → unmet
//! dependency set, plus a reverse index from dependency → dependents. A task
//! is released exactly when its last unmet dependency completes. Only
//! `Completed` dependencies satisfy edges; a dependency that ends in any
//! other terminal state leaves its dependents Waiting.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct DependencyTracker {
    /// Blocked task id → ids it is still waiting on
    waiting_on: HashMap<String, HashSet<String>>,

    /// Dependency id → tasks blocked on it
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blocked task with its set of unmet dependencies. The
    /// caller filters out dependencies that are already complete; an empty
    /// set means the task is immediately ready and is not tracked.
    pub fn register(&mut self, task_id: &str, unmet: HashSet<String>) {
        if unmet.is_empty() {
            return;
        }
        for dep in &unmet {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .push(task_id.to_string());
        }
        self.waiting_on.insert(task_id.to_string(), unmet);
    }

    /// Record a completion and return the ids of tasks whose last unmet
    /// dependency this was
    pub fn on_completed(&mut self, task_id: &str) -> Vec<String> {
        let Some(blocked) = self.dependents.remove(task_id) else {
            return Vec::new();
        };

        let mut released = Vec::new();
        for blocked_id in blocked {
            if let Some(unmet) = self.waiting_on.get_mut(&blocked_id) {
                unmet.remove(task_id);
                if unmet.is_empty() {
                    self.waiting_on.remove(&blocked_id);
                    released.push(blocked_id);
                }
            }
        }
        released
    }

    /// Whether a task has no unmet dependencies
    pub fn is_ready(&self, task_id: &str) -> bool {
        !self.waiting_on.contains_key(task_id)
    }

    /// Drop a task from tracking (cancellation of a Waiting task)
    pub fn remove(&mut self, task_id: &str) {
        if let Some(unmet) = self.waiting_on.remove(task_id) {
            for dep in unmet {
                if let Some(blocked) = self.dependents.get_mut(&dep) {
                    blocked.retain(|id| id != task_id);
                    if blocked.is_empty() {
                        self.dependents.remove(&dep);
                    }
                }
            }
        }
    }

    /// Check whether adding `task_id` with the given dependencies would
    /// close a cycle through the currently-blocked graph. Used only when
    /// cycle detection is enabled; the default behavior is no detection.
    pub fn would_cycle(&self, task_id: &str, depends_on: &HashSet<String>) -> bool {
        if depends_on.contains(task_id) {
            return true;
        }
        // DFS from each dependency through waiting_on edges back to task_id
        let mut stack: Vec<&str> = depends_on.iter().map(String::as_str).collect();
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == task_id {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(unmet) = self.waiting_on.get(current) {
                stack.extend(unmet.iter().map(String::as_str));
            }
        }
        false
    }

    /// Number of tasks currently blocked
    pub fn blocked_count(&self) -> usize {
        self.waiting_on.len()
    }
}
