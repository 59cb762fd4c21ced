//! One-shot broadcast of a single outcome to many waiters

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Collects waiters and hands each of them the same outcome exactly once
///
/// Subscribing after [`resolve`](Self::resolve) is refused, so every waiter
/// that did get a receiver is guaranteed to be woken.
#[derive(Debug)]
pub struct MulticastWaiter<T> {
    waiters: Mutex<Option<Vec<oneshot::Sender<T>>>>,
}

impl<T> Default for MulticastWaiter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MulticastWaiter<T> {
    /// Create an unresolved waiter with no subscribers
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(Some(Vec::new())),
        }
    }

    /// Create an unresolved waiter whose first subscriber is the caller
    pub fn with_subscriber() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let waiter = Self {
            waiters: Mutex::new(Some(vec![tx])),
        };
        (waiter, rx)
    }

    /// Register a new waiter, or `None` if already resolved
    pub fn subscribe(&self) -> Option<oneshot::Receiver<T>> {
        let mut waiters = self.waiters.lock();
        let waiters = waiters.as_mut()?;
        let (tx, rx) = oneshot::channel();
        waiters.push(tx);
        Some(rx)
    }

    /// Number of waiters registered so far
    pub fn len(&self) -> usize {
        self.waiters.lock().as_ref().map_or(0, Vec::len)
    }

    /// Check whether nobody is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether the outcome has been delivered
    pub fn is_resolved(&self) -> bool {
        self.waiters.lock().is_none()
    }
}

impl<T: Clone> MulticastWaiter<T> {
    /// Deliver `outcome` to every registered waiter
    ///
    /// Returns `false` if the waiter was already resolved. Waiters whose
    /// receiving side has been dropped are skipped.
    pub fn resolve(&self, outcome: T) -> bool {
        let Some(waiters) = self.waiters.lock().take() else {
            return false;
        };

        let mut waiters = waiters.into_iter().peekable();
        while let Some(tx) = waiters.next() {
            if waiters.peek().is_some() {
                let _ = tx.send(outcome.clone());
            } else {
                let _ = tx.send(outcome);
                break;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_every_waiter_gets_the_outcome() {
        let waiter = MulticastWaiter::new();
        let receivers: Vec<_> = (0..5).map(|_| waiter.subscribe().unwrap()).collect();
        assert_eq!(waiter.len(), 5);

        assert!(waiter.resolve(Arc::new("page")));

        let outcomes: Vec<_> = futures::future::join_all(receivers).await;
        let first = outcomes[0].as_ref().unwrap();
        for outcome in &outcomes {
            assert!(Arc::ptr_eq(first, outcome.as_ref().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_resolves_only_once() {
        let waiter = MulticastWaiter::new();
        let rx = waiter.subscribe().unwrap();

        assert!(waiter.resolve(1));
        assert!(!waiter.resolve(2));
        assert!(waiter.is_resolved());
        assert_eq!(rx.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_with_subscriber() {
        let (waiter, first) = MulticastWaiter::with_subscriber();
        let second = waiter.subscribe().unwrap();
        assert_eq!(waiter.len(), 2);

        waiter.resolve(Err::<u8, &str>("failed"));

        assert_eq!(first.await.unwrap(), Err("failed"));
        assert_eq!(second.await.unwrap(), Err("failed"));
    }

    #[test]
    fn test_no_subscription_after_resolution() {
        let waiter = MulticastWaiter::new();
        waiter.resolve(());

        assert!(waiter.subscribe().is_none());
        assert!(waiter.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_block_others() {
        let waiter = MulticastWaiter::new();
        let gone = waiter.subscribe().unwrap();
        let kept = waiter.subscribe().unwrap();
        drop(gone);

        assert!(waiter.resolve("done"));
        assert_eq!(kept.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_dropping_unresolved_waiter_closes_receivers() {
        let waiter: MulticastWaiter<u8> = MulticastWaiter::new();
        let rx = waiter.subscribe().unwrap();
        drop(waiter);

        assert!(rx.await.is_err());
    }
}
