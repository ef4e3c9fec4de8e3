//! Broadcast bus with fire-and-forget publishing

use crate::{message::MarketEvent, Result};
use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity (events buffered per subscriber)
const DEFAULT_CAPACITY: usize = 1024;

/// Event bus
///
/// Owns the broadcast channel. Cheap to clone handles off of; dropping the
/// bus and all publishers closes subscribers.
pub struct EventBus {
    sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    /// Create bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create bus with explicit capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a publisher handle
    pub fn publisher(&self) -> Publisher {
        Publisher {
            sender: self.sender.clone(),
        }
    }

    /// Attach a new subscriber
    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Publisher handle
#[derive(Clone)]
pub struct Publisher {
    sender: broadcast::Sender<MarketEvent>,
}

impl Publisher {
    /// Publish an event
    ///
    /// Fire-and-forget: an event published with no subscriber attached is
    /// dropped silently. Returns the number of subscribers reached.
    pub fn publish(&self, event: MarketEvent) -> usize {
        let subject = event.subject();
        match self.sender.send(event) {
            Ok(n) => {
                debug!(subject = %subject, subscribers = n, "Event published");
                n
            }
            Err(_) => {
                debug!(subject = %subject, "Event dropped, no subscribers");
                0
            }
        }
    }

    /// Publish a matching-pass request for an asset
    pub fn match_requested(&self, asset: &str) -> usize {
        self.publish(MarketEvent::match_requested(asset))
    }
}

/// Subscriber handle
pub struct Subscriber {
    receiver: broadcast::Receiver<MarketEvent>,
}

impl Subscriber {
    /// Receive the next event
    pub async fn recv(&mut self) -> Result<MarketEvent> {
        Ok(self.receiver.recv().await?)
    }

    /// Receive without waiting, `None` when no event is queued
    pub fn try_recv(&mut self) -> Option<MarketEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MarketEventKind;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let publisher = bus.publisher();
        let mut subscriber = bus.subscribe();

        let reached = publisher.match_requested("BTC");
        assert_eq!(reached, 1);

        let event = subscriber.recv().await.unwrap();
        assert_eq!(
            event.kind,
            MarketEventKind::MatchRequested {
                asset: "BTC".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        let publisher = bus.publisher();

        // Not an error, just dropped
        assert_eq!(publisher.match_requested("BTC"), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let publisher = bus.publisher();
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(publisher.match_requested("VGLD"), 2);

        assert_eq!(sub1.recv().await.unwrap().kind.asset(), "VGLD");
        assert_eq!(sub2.recv().await.unwrap().kind.asset(), "VGLD");
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();
        assert!(subscriber.try_recv().is_none());
    }
}
