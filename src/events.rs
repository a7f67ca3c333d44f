//! Core Notification Surface
//!
//! Typed events broadcast to the transport/UI layer. Subscribers receive a
//! `tokio::sync::broadcast::Receiver` and match on the closed [`CoreEvent`] enum;
//! there are no string-keyed event names.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::assistant::StatusSnapshot;
use crate::memory::MemoryEntry;
use crate::reasoning::Thought;
use crate::scheduler::Action;

/// Default channel capacity before slow subscribers start lagging
const DEFAULT_CAPACITY: usize = 256;

/// Event kinds, for subscribers that only care about a subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    MemoryAdded,
    TaskCreated,
    TaskUpdated,
    StatusUpdated,
    ThoughtGenerated,
    ProviderChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MemoryAdded => "memoryAdded",
            EventKind::TaskCreated => "taskCreated",
            EventKind::TaskUpdated => "taskUpdated",
            EventKind::StatusUpdated => "statusUpdated",
            EventKind::ThoughtGenerated => "thoughtGenerated",
            EventKind::ProviderChanged => "providerChanged",
        }
    }
}

/// Event emitted by the core
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum CoreEvent {
    /// A memory entry was inserted (including merged entries from consolidation)
    MemoryAdded(MemoryEntry),
    /// An action entered the planned list
    TaskCreated(Action),
    /// An action changed status
    TaskUpdated(Action),
    /// Periodic status refresh
    StatusUpdated(StatusSnapshot),
    /// The reasoning source produced a thought
    ThoughtGenerated(Thought),
    /// The preferred provider changed after a probe or a failure
    ProviderChanged { preferred: String },
}

impl CoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CoreEvent::MemoryAdded(_) => EventKind::MemoryAdded,
            CoreEvent::TaskCreated(_) => EventKind::TaskCreated,
            CoreEvent::TaskUpdated(_) => EventKind::TaskUpdated,
            CoreEvent::StatusUpdated(_) => EventKind::StatusUpdated,
            CoreEvent::ThoughtGenerated(_) => EventKind::ThoughtGenerated,
            CoreEvent::ProviderChanged { .. } => EventKind::ProviderChanged,
        }
    }
}

/// Broadcast bus shared by all components
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: CoreEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            trace!("No subscribers for {}", kind.as_str());
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(CoreEvent::ProviderChanged { preferred: "ollama".to_string() });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.emit(CoreEvent::ProviderChanged { preferred: "claude".to_string() });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::ProviderChanged);
        match event {
            CoreEvent::ProviderChanged { preferred } => assert_eq!(preferred, "claude"),
            other => panic!("unexpected event {:?}", other.kind()),
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::MemoryAdded.as_str(), "memoryAdded");
        assert_eq!(EventKind::TaskUpdated.as_str(), "taskUpdated");
    }
}
