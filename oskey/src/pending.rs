//! Signature request correlation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outstanding signature requests keyed by correlation id
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct SignRequests {
    inner: Arc<SignRequestsInner>,
}

#[derive(Debug, Default)]
struct SignRequestsInner {
    next_id: AtomicU32,
    waiters: Mutex<HashMap<u32, oneshot::Sender<String>>>,
}

impl SignRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and a receiver for its signature
    ///
    /// Ids start at 1 and wrap around, skipping 0.
    pub fn register(&self) -> (u32, oneshot::Receiver<String>) {
        let id = loop {
            let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
            if id != 0 {
                break id;
            }
        };

        let (tx, rx) = oneshot::channel();
        if self.inner.waiters.lock().insert(id, tx).is_some() {
            warn!(id, "Replaced a stale signature waiter");
        }
        (id, rx)
    }

    /// Deliver a signature to the waiter for `id`
    ///
    /// Returns false if nobody is waiting (unknown, timed out or already resolved).
    pub fn resolve(&self, id: u32, signature: String) -> bool {
        let Some(tx) = self.inner.waiters.lock().remove(&id) else {
            debug!(id, "No waiter for signature");
            return false;
        };
        tx.send(signature).is_ok()
    }

    /// Forget the waiter for `id`
    pub fn cancel(&self, id: u32) {
        self.inner.waiters.lock().remove(&id);
    }

    /// Drop every waiter; their receivers see a closed channel
    pub fn cancel_all(&self) {
        let mut waiters = self.inner.waiters.lock();
        if !waiters.is_empty() {
            debug!(count = waiters.len(), "Cancelling signature waiters");
        }
        waiters.clear();
    }

    pub fn pending(&self) -> usize {
        self.inner.waiters.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_resolve_matching_id() {
        let requests = SignRequests::new();
        let (first, first_rx) = requests.register();
        let (second, second_rx) = requests.register();
        assert_ne!(first, second);

        assert!(requests.resolve(second, "0xbb".into()));
        assert!(requests.resolve(first, "0xaa".into()));

        assert_eq!(first_rx.await.unwrap(), "0xaa");
        assert_eq!(second_rx.await.unwrap(), "0xbb");
        assert_eq!(requests.pending(), 0);
    }

    #[test]
    fn test_resolve_exactly_once() {
        let requests = SignRequests::new();
        let (id, _rx) = requests.register();
        assert!(requests.resolve(id, "0x01".into()));
        assert!(!requests.resolve(id, "0x02".into()));
        assert!(!requests.resolve(id + 100, "0x03".into()));
    }

    #[tokio::test]
    async fn test_cancel_all_closes_receivers() {
        let requests = SignRequests::new();
        let (_, rx) = requests.register();
        requests.cancel_all();
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_ids_skip_zero() {
        let requests = SignRequests::new();
        requests.inner.next_id.store(u32::MAX - 1, Ordering::Release);
        let (a, _) = requests.register();
        let (b, _) = requests.register();
        assert_eq!(a, u32::MAX);
        assert_eq!(b, 1);
    }
}
