use keydesk::protocol::{Broadcast, Event};
use tokio::sync::broadcast;

/// Fan-out of session notifications to any number of observers.
///
/// Sending never blocks and never fails the caller: with no subscribers the
/// event is simply dropped, and slow subscribers lag instead of applying
/// backpressure.
pub struct EventBroker {
    tx: broadcast::Sender<Broadcast>,
}

impl EventBroker {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.tx.subscribe()
    }

    pub fn broadcast(&self, channel: &str, event: Event) {
        tracing::trace!(channel, ?event, "broadcast");
        let _ = self.tx.send(Broadcast {
            channel: channel.to_string(),
            event,
        });
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new(256)
    }
}
