//! Event Bus - broadcast channel for scheduler lifecycle events
//!
//! The scheduler emits every lifecycle step here; consumers (the CLI, tests,
//! metrics sinks) subscribe. Emission never blocks and never fails.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::QueueEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broadcast bus for [`QueueEvent`]s
///
/// Cloning is cheap; all clones feed the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QueueEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped, and slow
    /// subscribers lose the oldest events once the channel is full.
    pub fn emit(&self, event: QueueEvent) {
        debug!(event_type = event.event_type(), task_id = ?event.task_id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;
    use tokio::sync::broadcast::error::TryRecvError;

    fn queued(id: u64) -> QueueEvent {
        QueueEvent::TaskQueued {
            task_id: TaskId::new(id),
            name: format!("task-{id}"),
            position: 0,
        }
    }

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(queued(1));
        bus.emit(queued(2));

        assert_eq!(rx.recv().await.unwrap().task_id(), Some(TaskId::new(1)));
        assert_eq!(rx.recv().await.unwrap().task_id(), Some(TaskId::new(2)));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::default();
        bus.emit(queued(1));
    }
}
