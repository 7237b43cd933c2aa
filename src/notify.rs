//! Change notifier.
//!
//! A process-wide broadcast point with no persisted state. The save
//! coordinator publishes after every commit, the remote-change handler
//! publishes on external signals, and anything that renders store data
//! subscribes and re-reads on receipt.
//!
//! Publishing is fire-and-forget: events carry no payload beyond their
//! kind, bursts are not deduplicated, and coalescing is the
//! subscriber's responsibility. A slow subscriber that overflows its
//! buffer sees a `Lagged` error from its receiver and should simply
//! re-read: missing N "something changed" events is the same as
//! missing one.

use tokio::sync::broadcast;

/// What kind of change occurred. Subscribers re-read either way; the
/// kind exists for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A local commit landed.
    Local,
    /// The external change source announced a remote mutation.
    Remote,
}

/// Broadcast publish point for store invalidation.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Create a notifier whose subscribers buffer up to `capacity`
    /// undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe for invalidation events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish a change event to all current subscribers.
    ///
    /// Never fails: publishing with no subscribers is a no-op.
    pub fn publish(&self, event: ChangeEvent) {
        // send errors only when there are no receivers
        let _ = self.tx.send(event);
        tracing::trace!(?event, "change published");
    }

    /// Number of live subscribers (for tests and diagnostics).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();

        notifier.publish(ChangeEvent::Local);
        notifier.publish(ChangeEvent::Remote);

        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::Local);
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::Remote);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_no_op() {
        let notifier = ChangeNotifier::default();
        assert_eq!(notifier.subscriber_count(), 0);

        // Must not panic or error
        notifier.publish(ChangeEvent::Local);
    }

    #[tokio::test]
    async fn test_bursts_are_not_deduplicated() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();

        for _ in 0..3 {
            notifier.publish(ChangeEvent::Local);
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }
}
