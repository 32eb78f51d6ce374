//! Event bus for shift fanout
//!
//! Pub/sub over a Tokio broadcast channel. Publishing with nobody listening
//! is not an error.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::FanoutEvent;
use crate::shift::ShiftId;

/// Default channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Receiver lagged behind by {0} events")]
    Lagged(u64),
}

/// Shared reference to FanoutEventBus
pub type SharedEventBus = Arc<FanoutEventBus>;

/// Broadcast bus for fanout events
pub struct FanoutEventBus {
    sender: broadcast::Sender<FanoutEvent>,
}

impl FanoutEventBus {
    /// Create a new event bus with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: FanoutEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "Event published"),
            Err(_) => debug!(event_type, "Event published (no receivers)"),
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<FanoutEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of one shift only
    pub fn subscribe_shift(&self, shift_id: ShiftId) -> ShiftReceiver {
        ShiftReceiver {
            receiver: self.subscribe(),
            shift_id,
        }
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FanoutEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that only yields events for one shift
pub struct ShiftReceiver {
    receiver: broadcast::Receiver<FanoutEvent>,
    shift_id: ShiftId,
}

impl ShiftReceiver {
    /// Receive the next event for this shift
    pub async fn recv(&mut self) -> Result<FanoutEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::ChannelClosed,
                broadcast::error::RecvError::Lagged(n) => EventBusError::Lagged(n),
            })?;
            if event.shift_id() == &self.shift_id {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = FanoutEventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(FanoutEvent::ShiftAdmitted {
            shift_id: ShiftId::new("s1"),
            timestamp: Utc::now(),
        });

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "shift_admitted");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = FanoutEventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(FanoutEvent::DuplicateIgnored {
            shift_id: ShiftId::new("s1"),
            timestamp: Utc::now(),
        });
    }

    #[tokio::test]
    async fn test_shift_receiver_filters() {
        let bus = FanoutEventBus::new().shared();
        let mut filtered = bus.subscribe_shift(ShiftId::new("target"));

        let bus_clone = bus.clone();
        tokio::spawn(async move {
            bus_clone.publish(FanoutEvent::ShiftAdmitted {
                shift_id: ShiftId::new("other"),
                timestamp: Utc::now(),
            });
            bus_clone.publish(FanoutEvent::ShiftExhausted {
                shift_id: ShiftId::new("target"),
                rounds: 2,
                timestamp: Utc::now(),
            });
        });

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.event_type(), "shift_exhausted");
        assert_eq!(event.shift_id().as_str(), "target");
    }
}
