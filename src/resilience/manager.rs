//! Lazily-populated registry of per-playbook circuit breakers.
//!
//! Breakers are created on first execution attempt with the shared
//! configuration and never deleted during the process lifetime.

use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerManager {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Get or lazily create the breaker for a playbook
    pub fn for_playbook(&self, playbook_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(playbook_id.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    playbook_id.to_string(),
                    self.config.clone(),
                ))
            })
            .clone()
    }

    /// Status of one breaker, if it has been created
    pub fn status(&self, playbook_id: &str) -> Option<CircuitBreakerStatus> {
        self.breakers.get(playbook_id).map(|b| b.status())
    }

    /// Manually reset one breaker to Closed. Returns false when no breaker
    /// exists for the id yet.
    pub fn reset(&self, playbook_id: &str) -> bool {
        match self.breakers.get(playbook_id) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Snapshot of every breaker created so far
    pub fn all_statuses(&self) -> HashMap<String, CircuitBreakerStatus> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status()))
            .collect()
    }
}
