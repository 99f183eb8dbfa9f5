//! Event system for session and input notifications
//!
//! Sessions publish [`StreamEvent`]s onto an explicitly owned bus that is
//! injected at construction. Consumers can subscribe to everything or to a
//! single player's events.

pub mod types;

pub use types::{StreamEvent, Vec2};

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event bus for broadcasting session events
///
/// Built on tokio's broadcast channel. Every published event goes to the
/// global channel; player-scoped events are additionally delivered to that
/// player's channel when anyone holds a per-player subscription.
pub struct EventBus {
    tx: broadcast::Sender<StreamEvent>,
    player_tx: RwLock<HashMap<String, broadcast::Sender<StreamEvent>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tx,
            player_tx: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an event to all subscribers
    ///
    /// With no active subscribers the event is silently dropped; events are
    /// fire-and-forget notifications.
    pub fn publish(&self, event: StreamEvent) {
        if let Some(player_id) = event.player_id() {
            let map = self.player_tx.read();
            if let Some(tx) = map.get(player_id) {
                let _ = tx.send(event.clone());
            }
        }
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Subscribe to one player's events, creating the channel if needed
    pub fn subscribe_player(&self, player_id: &str) -> broadcast::Receiver<StreamEvent> {
        let mut map = self.player_tx.write();
        map.entry(player_id.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop the per-player channel once the player is gone
    ///
    /// Outstanding receivers see the channel close.
    pub fn remove_player(&self, player_id: &str) -> bool {
        self.player_tx.write().remove(player_id).is_some()
    }

    /// Drop all per-player channels
    pub fn clear_players(&self) {
        self.player_tx.write().clear();
    }

    /// Current number of global subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(StreamEvent::StreamingStarted {
            session_id: "scene0".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, StreamEvent::StreamingStarted { .. }));
    }

    #[tokio::test]
    async fn test_player_subscription_filters_by_player() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_player("p1");

        bus.publish(StreamEvent::PlayerConnected {
            player_id: "p2".to_string(),
        });
        bus.publish(StreamEvent::PlayerConnected {
            player_id: "p1".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            StreamEvent::PlayerConnected {
                player_id: "p1".to_string()
            }
        );
        // Nothing else queued for p1
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_remove_player_closes_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_player("p1");
        assert!(bus.remove_player("p1"));
        assert!(!bus.remove_player("p1"));

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        // Publishing with no subscribers must not panic
        bus.publish(StreamEvent::SfuDisconnected {
            session_id: "scene0".to_string(),
        });
    }
}
