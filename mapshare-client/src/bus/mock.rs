//! Mock event bus for testing.
//!
//! Allows emitting events and counting subscriptions for verification.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;

use super::{EventBus, MapShareEvent};

/// Mock event bus for testing.
///
/// Events emitted while no subscriber is attached are dropped, matching
/// the real bus: an unsubscribed store never sees missed events.
#[derive(Debug)]
pub struct MockEventBus {
    tx: broadcast::Sender<MapShareEvent>,
    subscribe_calls: AtomicUsize,
}

impl MockEventBus {
    /// Create a new mock event bus.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self {
            tx,
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: MapShareEvent) {
        // No subscribers is fine; the event is simply dropped.
        let _ = self.tx.send(event);
    }

    /// Number of times `subscribe` was called.
    pub fn subscribe_count(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of currently attached subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MockEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for MockEventBus {
    fn subscribe(&self) -> broadcast::Receiver<MapShareEvent> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapshare_types::ShareId;

    #[tokio::test]
    async fn delivers_events_to_subscriber() {
        let bus = MockEventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(MapShareEvent::Cancelled {
            share_id: ShareId::new("share-1"),
        });

        match rx.recv().await.unwrap() {
            MapShareEvent::Cancelled { share_id } => {
                assert_eq!(share_id, ShareId::new("share-1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn counts_subscriptions() {
        let bus = MockEventBus::new();
        assert_eq!(bus.subscribe_count(), 0);

        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscribe_count(), 2);
        assert_eq!(bus.receiver_count(), 2);
    }

    #[tokio::test]
    async fn events_without_subscribers_are_dropped() {
        let bus = MockEventBus::new();
        bus.emit(MapShareEvent::Cancelled {
            share_id: ShareId::new("share-1"),
        });

        // A subscriber attached afterwards sees nothing.
        let mut rx = bus.subscribe();
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
