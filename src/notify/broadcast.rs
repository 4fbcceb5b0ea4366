//! Fan-out of live events to connected WebSocket clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const NEW_FRAME_EVENT: &str = "new_frame";

/// Event pushed to live clients, scoped to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub event: String,
    pub username: String,
}

/// Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct LiveBroadcaster {
    tx: broadcast::Sender<LiveEvent>,
}

impl LiveBroadcaster {
    /// `capacity` bounds how far a slow client may fall behind before it
    /// starts missing events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    /// Never blocks. Returns how many clients were listening.
    pub fn send(&self, event: LiveEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => {
                tracing::debug!(subscribers = n, "Live event broadcast");
                n
            }
            Err(_) => {
                tracing::trace!("No live subscribers");
                0
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user: &str) -> LiveEvent {
        LiveEvent { event: NEW_FRAME_EVENT.into(), username: user.into() }
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let live = LiveBroadcaster::new(8);
        let mut a = live.subscribe();
        let mut b = live.subscribe();

        assert_eq!(live.send(event("alice")), 2);
        assert_eq!(a.recv().await.unwrap(), event("alice"));
        assert_eq!(b.recv().await.unwrap(), event("alice"));
    }

    #[test]
    fn send_without_subscribers_is_harmless() {
        let live = LiveBroadcaster::new(8);
        assert_eq!(live.send(event("alice")), 0);
        assert_eq!(live.receiver_count(), 0);
    }

    #[test]
    fn wire_format_is_flat_json() {
        let json = serde_json::to_string(&event("alice")).unwrap();
        assert_eq!(json, r#"{"event":"new_frame","username":"alice"}"#);
    }
}
