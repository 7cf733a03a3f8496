//! # Query Watching
//!
//! Live views over document queries.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        WATCH PIPELINE                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   watch_query(q)                                                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   WatchRegistry ──── register(q) ───► (id, receiver)                    │
//! │        │                                                                │
//! │        │  committed write touches q's collection                        │
//! │        ▼                                                                │
//! │   re-run q ──── push snapshot ───► Subscription::recv()                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Watchers receive whole result snapshots, not deltas. A snapshot is
//! pushed once at registration and again after every committed write that
//! touches the watched collection. Dropping or cancelling the
//! [`Subscription`] removes the watcher; a watcher whose receiver has gone
//! away is pruned on the next push.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::database::Document;
use super::query::Query;

/// Registered watchers, keyed by watcher id
pub(crate) struct WatchRegistry {
    entries: Mutex<HashMap<u64, WatchEntry>>,
    next_id: AtomicU64,
}

struct WatchEntry {
    query: Query,
    sender: mpsc::UnboundedSender<Vec<Document>>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a watcher and hand back its id and snapshot receiver.
    pub(crate) fn register(&self, query: Query) -> (u64, mpsc::UnboundedReceiver<Vec<Document>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(id, WatchEntry { query, sender });
        (id, receiver)
    }

    pub(crate) fn deregister(&self, id: u64) {
        self.entries.lock().remove(&id);
    }

    /// Watchers whose collection was touched by a committed write.
    pub(crate) fn affected(&self, collections: &[String]) -> Vec<(u64, Query)> {
        let entries = self.entries.lock();
        entries
            .iter()
            .filter(|(_, entry)| {
                collections
                    .iter()
                    .any(|c| c == entry.query.collection_name())
            })
            .map(|(id, entry)| (*id, entry.query.clone()))
            .collect()
    }

    /// Deliver a snapshot to one watcher, pruning it if the receiver is gone.
    pub(crate) fn push(&self, id: u64, snapshot: Vec<Document>) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&id) {
            if entry.sender.send(snapshot).is_err() {
                entries.remove(&id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// A live view over one query
///
/// Yields the full result set at registration time and again after every
/// committed write to the watched collection. The view stays open until
/// [`cancel`](Subscription::cancel) is called or the handle is dropped.
pub struct Subscription {
    id: u64,
    registry: Arc<WatchRegistry>,
    receiver: mpsc::UnboundedReceiver<Vec<Document>>,
    cancelled: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        registry: Arc<WatchRegistry>,
        receiver: mpsc::UnboundedReceiver<Vec<Document>>,
    ) -> Self {
        Self {
            id,
            registry,
            receiver,
            cancelled: false,
        }
    }

    /// A subscription that yields nothing and is already closed
    ///
    /// Handed out where a live view is requested but cannot be opened yet,
    /// e.g. before a user is signed in.
    pub(crate) fn closed() -> Self {
        let registry = Arc::new(WatchRegistry::new());
        let (_, receiver) = mpsc::unbounded_channel();
        Self {
            id: 0,
            registry,
            receiver,
            cancelled: true,
        }
    }

    /// Wait for the next snapshot
    ///
    /// Returns `None` once the subscription is cancelled and drained.
    pub async fn recv(&mut self) -> Option<Vec<Document>> {
        self.receiver.recv().await
    }

    /// Stop watching
    ///
    /// Snapshots already delivered may still be drained with
    /// [`recv`](Subscription::recv); no new ones arrive.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.registry.deregister(self.id);
            self.receiver.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// TESTS
// ============================================================================
