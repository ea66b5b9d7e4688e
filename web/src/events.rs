//! Push channel fan-out.
//!
//! [`BroadcastPublisher`] implements the core event publisher on a tokio
//! broadcast channel. Every websocket connection holds its own receiver.
//! Delivery is best effort: slow clients skip events and nobody blocks.

use courtside_core::DomainEvent;
use courtside_core::environment::{EventPublisher, NotifyError};
use tokio::sync::broadcast;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Publishes domain events to connected websocket clients.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastPublisher {
    /// Create a publisher buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receiver for a new connection.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: DomainEvent) -> Result<(), NotifyError> {
        let name = event.name();
        // No subscribers is normal; the channel only errs when nobody listens.
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "Event broadcast"),
            Err(_) => tracing::debug!(event = name, "Event dropped, no subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courtside_core::types::{BookingId, CourtId};

    fn cancelled() -> DomainEvent {
        DomainEvent::BookingCancelled {
            booking_id: BookingId::new(),
            court_id: CourtId::new(),
            start_time: Utc::now(),
            end_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_events() {
        let publisher = BroadcastPublisher::default();
        let mut a = publisher.subscribe();
        let mut b = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        let event = cancelled();
        publisher.publish(event.clone()).unwrap();

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[test]
    fn publishing_without_subscribers_succeeds() {
        let publisher = BroadcastPublisher::default();
        assert!(publisher.publish(cancelled()).is_ok());
    }
}
