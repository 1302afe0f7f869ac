use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Which subsystem an event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Task,
    Playbook,
    CircuitBreaker,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Playbook => write!(f, "playbook"),
            Self::CircuitBreaker => write!(f, "circuit_breaker"),
        }
    }
}

/// Structured lifecycle event emitted on every state transition
#[derive(Debug, Clone, Serialize)]
pub struct CoreEvent {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub category: EventCategory,
    /// Task id, playbook id, or breaker component name
    pub id: String,
    /// Transition name, e.g. `started`, `completed`, `circuit_open`
    pub status: String,
    pub duration_ms: Option<u64>,
    pub payload: Value,
}

/// High-throughput event publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a fully-formed event. Publishing is fire-and-forget: sends
    /// with no active subscribers are not an error.
    pub fn publish(
        &self,
        category: EventCategory,
        id: impl Into<String>,
        status: impl Into<String>,
        duration_ms: Option<u64>,
        payload: Value,
    ) {
        let event = CoreEvent {
            timestamp: chrono::Utc::now(),
            category,
            id: id.into(),
            status: status.into(),
            duration_ms,
            payload,
        };

        // Broadcast send() errors only when there are no subscribers, which
        // is acceptable for a write-only sink.
        let _ = self.sender.send(event);
    }

    /// Publish a task lifecycle transition
    pub fn publish_task(&self, task_id: &str, status: &str, duration_ms: Option<u64>, payload: Value) {
        self.publish(EventCategory::Task, task_id, status, duration_ms, payload);
    }

    /// Publish a playbook run transition
    pub fn publish_playbook(
        &self,
        playbook_id: &str,
        status: &str,
        duration_ms: Option<u64>,
        payload: Value,
    ) {
        self.publish(EventCategory::Playbook, playbook_id, status, duration_ms, payload);
    }

    /// Publish a circuit breaker transition
    pub fn publish_breaker(&self, component: &str, status: &str, payload: Value) {
        self.publish(EventCategory::CircuitBreaker, component, status, None, payload);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000) // Default capacity of 1000 events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let publisher = EventPublisher::new(16);
        let mut rx = publisher.subscribe();

        publisher.publish_task("task-1", "enqueued", None, json!({"priority": 1}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.category, EventCategory::Task);
        assert_eq!(event.id, "task-1");
        assert_eq!(event.status, "enqueued");
        assert_eq!(event.payload["priority"], 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::default();
        // Must not panic or error when nobody is listening
        publisher.publish_breaker("disk-cleanup", "opened", json!({}));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let publisher = EventPublisher::new(4);
        let mut rx = publisher.subscribe();
        publisher.publish_playbook("pb-1", "circuit_open", Some(12), json!({}));
        let event = rx.try_recv().unwrap();
        let serialized = serde_json::to_value(&event).unwrap();
        assert_eq!(serialized["category"], "playbook");
        assert_eq!(serialized["duration_ms"], 12);
    }
}
