//! Domain events published when pairs form.
//!
//! Chat and notification collaborators subscribe to these to open a
//! conversation or push an alert; the pairing engine itself never blocks
//! on a consumer.

use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum DomainEvent {
    MatchCreated {
        match_id: Uuid,
        user1_id: String,
        user2_id: String,
    },
    MatchRequestAccepted {
        request_id: Uuid,
        match_id: Uuid,
    },
}

/// Broadcast fan-out of domain events. Publishing is fire-and-forget: a
/// missing subscriber drops the event rather than failing the operation
/// that produced it.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("no event subscribers registered, dropping event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        let match_id = Uuid::new_v4();
        bus.publish(DomainEvent::MatchCreated {
            match_id,
            user1_id: "alice".to_string(),
            user2_id: "bob".to_string(),
        });

        match rx.recv().await {
            Ok(DomainEvent::MatchCreated { match_id: id, .. }) => assert_eq!(id, match_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new(8);
        bus.publish(DomainEvent::MatchRequestAccepted {
            request_id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
        });
    }
}
