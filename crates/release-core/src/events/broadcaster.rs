//! Event broadcaster for watch notifications.
//!
//! Uses tokio's broadcast channel, so every subscriber sees every event sent
//! after it subscribed. Slow subscribers lose the oldest events once the
//! buffer fills up.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::WatchEvent;

/// Default buffer size for the broadcast channel.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Broadcaster for watch events.
///
/// Cheap to clone; all clones share the same channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<WatchEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new broadcaster with custom buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new broadcaster wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, 0 when
    /// nobody is listening.
    pub fn send(&self, event: WatchEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers.
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::WatchEventType;
    use crate::meta::ObjectKey;
    use tokio_test::block_on;

    #[test]
    fn test_broadcaster_no_subscribers() {
        let broadcaster = EventBroadcaster::new();
        assert!(!broadcaster.has_subscribers());
        let count =
            broadcaster.send(WatchEvent::created("Release", ObjectKey::new("ns", "r1"), 1));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_broadcaster_send_receive() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.send(WatchEvent::deleted("Release", ObjectKey::new("ns", "r1"), 3));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type, WatchEventType::Deleted);
        assert_eq!(event.key.name, "r1");
        assert_eq!(event.old_generation, Some(3));
    }

    #[test]
    fn test_broadcaster_multiple_subscribers() {
        let broadcaster = EventBroadcaster::new_shared();
        let mut receiver1 = broadcaster.subscribe();
        let mut receiver2 = broadcaster.clone().subscribe();

        let count = broadcaster.send(WatchEvent::generic("Release", ObjectKey::new("ns", "r1")));
        assert_eq!(count, 2);

        block_on(async {
            assert_eq!(receiver1.recv().await.unwrap().event_type, WatchEventType::Generic);
            assert_eq!(receiver2.recv().await.unwrap().event_type, WatchEventType::Generic);
        });
    }
}
