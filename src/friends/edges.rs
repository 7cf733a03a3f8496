//! Friendship edge storage.
//!
//! A friendship between `a` and `b` is stored as two mirrored documents,
//! `users/a/friends/b` and `users/b/friends/a`, carrying identical
//! timestamps. Both copies are always written and removed inside a single
//! transaction so the pair can never be observed one-sided.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::{Atomic, Database, Query, SortDirection};
use crate::time::now_timestamp_millis;

// ============================================================================
// TYPES
// ============================================================================

/// One side of a mirrored friendship edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendEdge {
    /// Uid of the friend this edge points at
    pub friend_uid: String,
    /// When the friendship was accepted (epoch millis)
    pub since: i64,
    /// Last interaction across the edge, drives list ordering (epoch millis)
    pub last_interaction_at: i64,
}

// ============================================================================
// EDGE STORE
// ============================================================================

/// Reads and writes mirrored friendship edges
pub struct EdgeStore {
    db: Arc<Database>,
}

impl EdgeStore {
    /// Build an edge store over an open database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch the edge `owner` holds for `friend`, if any
    pub async fn edge(&self, owner: &str, friend: &str) -> Result<Option<FriendEdge>> {
        let doc = self.db.get_document(&super::friends_of(owner), friend).await?;
        doc.map(|d| d.decode()).transpose()
    }

    /// True when a friendship edge exists from `a` to `b`
    pub async fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        Ok(self.edge(a, b).await?.is_some())
    }

    /// All of `owner`'s edges, most recently interacted first
    pub async fn list_friends(&self, owner: &str) -> Result<Vec<FriendEdge>> {
        let query = Query::collection(super::friends_of(owner))
            .order_by("lastInteractionAt", SortDirection::Descending);
        let docs = self.db.run_query(&query).await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Bump `lastInteractionAt` on both mirrored copies of the `a`/`b` edge.
    ///
    /// Both sides receive the same timestamp. Fails with [`Error::NotFriends`]
    /// when the pair is not friends.
    pub async fn touch_interaction(&self, a: &str, b: &str) -> Result<()> {
        let a = a.to_string();
        let b = b.to_string();
        self.db
            .run_atomic(move |tx| {
                let mut forward = Self::edge_in(tx, &a, &b)?.ok_or(Error::NotFriends)?;
                let mut backward = Self::edge_in(tx, &b, &a)?.ok_or(Error::NotFriends)?;
                let now = now_timestamp_millis();
                forward.last_interaction_at = now;
                backward.last_interaction_at = now;
                tx.write(&super::friends_of(&a), &b, &serde_json::to_value(&forward)?)?;
                tx.write(&super::friends_of(&b), &a, &serde_json::to_value(&backward)?)?;
                Ok(())
            })
            .await
    }

    // ===== TRANSACTION HELPERS =====

    /// Read one directed edge inside an open transaction
    pub(crate) fn edge_in(tx: &Atomic<'_>, owner: &str, friend: &str) -> Result<Option<FriendEdge>> {
        let doc = tx.read(&super::friends_of(owner), friend)?;
        doc.map(|d| d.decode()).transpose()
    }

    /// Write both mirrored edges for `a`/`b` with identical timestamps
    pub(crate) fn write_mirrored(tx: &mut Atomic<'_>, a: &str, b: &str, now: i64) -> Result<()> {
        let forward = FriendEdge {
            friend_uid: b.to_string(),
            since: now,
            last_interaction_at: now,
        };
        let backward = FriendEdge {
            friend_uid: a.to_string(),
            since: now,
            last_interaction_at: now,
        };
        tx.write(&super::friends_of(a), b, &serde_json::to_value(&forward)?)?;
        tx.write(&super::friends_of(b), a, &serde_json::to_value(&backward)?)?;
        Ok(())
    }

    /// Delete both mirrored edges for `a`/`b`. Returns whether any side existed.
    pub(crate) fn remove_mirrored(tx: &mut Atomic<'_>, a: &str, b: &str) -> Result<bool> {
        let forward = tx.delete(&super::friends_of(a), b)?;
        let backward = tx.delete(&super::friends_of(b), a)?;
        Ok(forward || backward)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn store() -> (Arc<Database>, EdgeStore) {
        let db = Arc::new(Database::open(None).await.unwrap());
        let store = EdgeStore::new(Arc::clone(&db));
        (db, store)
    }

    async fn befriend(db: &Arc<Database>, a: &str, b: &str, now: i64) {
        let a = a.to_string();
        let b = b.to_string();
        db.run_atomic(move |tx| EdgeStore::write_mirrored(tx, &a, &b, now))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_mirrored_edges_are_symmetric() {
        let (db, store) = store().await;
        befriend(&db, "alice", "bob", 1000).await;

        let forward = store.edge("alice", "bob").await.unwrap().unwrap();
        let backward = store.edge("bob", "alice").await.unwrap().unwrap();
        assert_eq!(forward.friend_uid, "bob");
        assert_eq!(backward.friend_uid, "alice");
        assert_eq!(forward.since, backward.since);
        assert_eq!(forward.last_interaction_at, backward.last_interaction_at);
        assert!(store.are_friends("alice", "bob").await.unwrap());
        assert!(store.are_friends("bob", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_deletes_both_sides() {
        let (db, store) = store().await;
        befriend(&db, "alice", "bob", 1000).await;

        let removed = db
            .run_atomic(|tx| EdgeStore::remove_mirrored(tx, "alice", "bob"))
            .await
            .unwrap();
        assert!(removed);
        assert!(!store.are_friends("alice", "bob").await.unwrap());
        assert!(!store.are_friends("bob", "alice").await.unwrap());

        let removed_again = db
            .run_atomic(|tx| EdgeStore::remove_mirrored(tx, "alice", "bob"))
            .await
            .unwrap();
        assert!(!removed_again);
    }

    #[tokio::test]
    async fn test_touch_interaction_reorders_listing() {
        let (db, store) = store().await;
        befriend(&db, "me", "old", 1000).await;
        befriend(&db, "me", "recent", 2000).await;

        let before = store.list_friends("me").await.unwrap();
        assert_eq!(before[0].friend_uid, "recent");

        store.touch_interaction("me", "old").await.unwrap();

        let after = store.list_friends("me").await.unwrap();
        assert_eq!(after[0].friend_uid, "old");
        assert_eq!(after.len(), 2);

        // The mirror moved in lockstep.
        let forward = store.edge("me", "old").await.unwrap().unwrap();
        let backward = store.edge("old", "me").await.unwrap().unwrap();
        assert_eq!(forward.last_interaction_at, backward.last_interaction_at);
        assert!(forward.last_interaction_at > 1000);
    }

    #[tokio::test]
    async fn test_touch_interaction_requires_friendship() {
        let (_db, store) = store().await;
        let result = store.touch_interaction("me", "stranger").await;
        assert!(matches!(result, Err(Error::NotFriends)));
    }

    #[tokio::test]
    async fn test_listing_is_scoped_to_owner() {
        let (db, store) = store().await;
        befriend(&db, "alice", "bob", 1000).await;
        befriend(&db, "carol", "dave", 2000).await;

        let friends = store.list_friends("alice").await.unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].friend_uid, "bob");
    }
}
