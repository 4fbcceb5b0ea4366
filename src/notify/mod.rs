//! Alert delivery. Push messages go out as tracked background tasks with a
//! bounded timeout; live events are a non-blocking channel send. Neither can
//! fail the request that triggered them.

pub mod broadcast;
pub mod telegram;

use crate::common::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

pub use broadcast::{LiveBroadcaster, LiveEvent, NEW_FRAME_EVENT};
pub use telegram::TelegramClient;

/// External messaging channel addressed by an opaque destination handle.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn push(&self, destination: &str, text: &str, image: Option<Bytes>) -> Result<()>;
}

pub struct NotificationDispatcher {
    push: Option<Arc<dyn PushChannel>>,
    live: LiveBroadcaster,
    timeout: Duration,
    tracker: TaskTracker,
}

impl NotificationDispatcher {
    pub fn new(push: Option<Arc<dyn PushChannel>>, live: LiveBroadcaster, timeout: Duration) -> Self {
        Self { push, live, timeout, tracker: TaskTracker::new() }
    }

    /// Queue a push message. Returns `false` when it was skipped because no
    /// destination or channel is configured.
    pub fn notify(&self, destination: Option<&str>, text: &str, image: Option<Bytes>) -> bool {
        let Some(destination) = destination.map(str::trim).filter(|d| !d.is_empty()) else {
            tracing::debug!("No push destination, skipping");
            return false;
        };
        let Some(push) = self.push.clone() else {
            tracing::debug!("No push channel configured, skipping");
            return false;
        };

        let destination = destination.to_string();
        let text = text.to_string();
        let timeout = self.timeout;
        self.tracker.spawn(async move {
            match tokio::time::timeout(timeout, push.push(&destination, &text, image)).await {
                Ok(Ok(())) => tracing::debug!(%destination, "Push delivered"),
                Ok(Err(e)) => tracing::warn!(%destination, "Push failed: {}", e),
                Err(_) => tracing::warn!(%destination, "Push timed out after {:?}", timeout),
            }
        });
        true
    }

    pub fn broadcast(&self, username: &str, event: &str) -> usize {
        self.live.send(LiveEvent { event: event.to_string(), username: username.to_string() })
    }

    pub fn live(&self) -> &LiveBroadcaster {
        &self.live
    }

    /// Wait for in-flight pushes, then accept new ones again.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop accepting work and wait for in-flight pushes.
    pub async fn close(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Notification dispatcher drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::WatcherError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String, bool)>>,
    }

    #[async_trait]
    impl PushChannel for Recorder {
        async fn push(&self, destination: &str, text: &str, image: Option<Bytes>) -> Result<()> {
            self.sent.lock().push((destination.into(), text.into(), image.is_some()));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl PushChannel for Failing {
        async fn push(&self, _: &str, _: &str, _: Option<Bytes>) -> Result<()> {
            Err(WatcherError::Notify("down".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl PushChannel for Hanging {
        async fn push(&self, _: &str, _: &str, _: Option<Bytes>) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn dispatcher(push: Arc<dyn PushChannel>, timeout: Duration) -> NotificationDispatcher {
        NotificationDispatcher::new(Some(push), LiveBroadcaster::new(4), timeout)
    }

    #[tokio::test]
    async fn empty_destination_is_skipped() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(recorder.clone(), Duration::from_secs(1));

        assert!(!d.notify(None, "hi", None));
        assert!(!d.notify(Some("  "), "hi", None));
        assert!(d.notify(Some("42"), "hi", Some(Bytes::from_static(b"jpg"))));
        d.flush().await;

        assert_eq!(*recorder.sent.lock(), vec![("42".to_string(), "hi".to_string(), true)]);
    }

    #[tokio::test]
    async fn failures_and_timeouts_are_contained() {
        let d = dispatcher(Arc::new(Failing), Duration::from_secs(1));
        assert!(d.notify(Some("42"), "hi", None));
        d.flush().await;

        let d = dispatcher(Arc::new(Hanging), Duration::from_millis(20));
        assert!(d.notify(Some("42"), "hi", None));
        tokio::time::timeout(Duration::from_secs(2), d.close()).await.unwrap();
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let d = NotificationDispatcher::new(None, LiveBroadcaster::new(4), Duration::from_secs(1));
        let mut rx = d.live().subscribe();
        assert!(!d.notify(Some("42"), "hi", None));
        assert_eq!(d.broadcast("alice", NEW_FRAME_EVENT), 1);
        assert_eq!(rx.recv().await.unwrap().username, "alice");
    }
}
