//! Change notifications for cache observers.
//!
//! Observers learn that the collection changed and re-query for fresh data;
//! notifications carry no rows. Delivery is best effort over
//! [`tokio::sync::broadcast`]: a publisher never waits, and a subscriber that
//! falls behind by more than the channel capacity sees
//! [`broadcast::error::RecvError::Lagged`].

use tokio::sync::broadcast;

use super::address::MessageAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// A change to the message collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Always the collection address.
    pub address: MessageAddress,
    pub kind: ChangeKind,
}

/// Fan-out of [`Change`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<Change>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change to the collection. Returns how many subscribers will
    /// see it; with none the change is dropped.
    pub fn notify(&self, kind: ChangeKind) -> usize {
        let change = Change { address: MessageAddress::AllMessages, kind };
        match self.sender.send(change) {
            Ok(receivers) => {
                tracing::debug!(?kind, receivers, "Published cache change");
                receivers
            }
            Err(_) => {
                tracing::trace!(?kind, "Cache change published with no subscribers");
                0
            }
        }
    }

    /// Receive every change published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_changes() {
        let notifier = ChangeNotifier::new(8);
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        assert_eq!(notifier.notify(ChangeKind::Inserted), 2);

        for rx in [&mut first, &mut second] {
            let change = rx.recv().await.unwrap();
            assert_eq!(change.address, MessageAddress::AllMessages);
            assert_eq!(change.kind, ChangeKind::Inserted);
        }
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = ChangeNotifier::new(8);
        assert_eq!(notifier.subscriber_count(), 0);
        assert_eq!(notifier.notify(ChangeKind::Deleted), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let notifier = ChangeNotifier::new(2);
        let mut rx = notifier.subscribe();
        for _ in 0..5 {
            notifier.notify(ChangeKind::Updated);
        }
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(3))));
    }
}
