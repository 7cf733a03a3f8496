//! Cursor-paginated friend listing.
//!
//! Pages walk `users/<uid>/friends` ordered by `lastInteractionAt`
//! descending, using the last loaded value as an exclusive cursor. The
//! pager keeps one in-memory slice per owner; store failures never tear
//! the slice down, they land in [`FriendsPage::error`] while the loaded
//! items stay put.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::storage::{Database, Query, SortDirection};

use super::edges::FriendEdge;

// ============================================================================
// PAGE STATE
// ============================================================================

/// Snapshot of the pager's list state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FriendsPage {
    /// Edges loaded so far, most recently interacted first
    pub items: Vec<FriendEdge>,
    /// Cursor for the next page, the last loaded `lastInteractionAt`
    pub next_cursor: Option<i64>,
    /// Set once a page comes back short
    pub reached_end: bool,
    /// A load is in flight
    pub loading: bool,
    /// Message from the most recent failed load, if any
    pub error: Option<String>,
}

// ============================================================================
// PAGER
// ============================================================================

/// Loads one user's friend list page by page
pub struct FriendListPager {
    db: Arc<Database>,
    owner_uid: String,
    page_size: usize,
    state: RwLock<FriendsPage>,
}

impl FriendListPager {
    /// Build a pager over `owner_uid`'s friend collection
    pub fn new(db: Arc<Database>, owner_uid: impl Into<String>, page_size: usize) -> Self {
        Self {
            db,
            owner_uid: owner_uid.into(),
            page_size,
            state: RwLock::new(FriendsPage::default()),
        }
    }

    /// Whose friend list this pager walks
    pub fn owner_uid(&self) -> &str {
        &self.owner_uid
    }

    /// Current state without loading anything
    pub fn snapshot(&self) -> FriendsPage {
        self.state.read().clone()
    }

    /// Load the first page, replacing whatever was loaded before
    pub async fn load_first_page(&self) -> FriendsPage {
        {
            let mut state = self.state.write();
            if state.loading {
                return state.clone();
            }
            state.loading = true;
            state.error = None;
        }

        let fetched = self.fetch(None).await;
        let mut state = self.state.write();
        state.loading = false;
        match fetched {
            Ok(batch) => {
                state.reached_end = batch.len() < self.page_size;
                state.next_cursor = batch.last().map(|e| e.last_interaction_at);
                state.items = batch;
            }
            Err(e) => {
                tracing::warn!("Failed to load friends for {}: {}", self.owner_uid, e);
                state.error = Some(e.to_string());
            }
        }
        state.clone()
    }

    /// Load the page after the current cursor and append it.
    ///
    /// A no-op while a load is in flight or once the end was reached.
    pub async fn load_next_page(&self) -> FriendsPage {
        let cursor = {
            let mut state = self.state.write();
            if state.loading || state.reached_end {
                return state.clone();
            }
            state.loading = true;
            state.error = None;
            state.next_cursor
        };

        let fetched = self.fetch(cursor).await;
        let mut state = self.state.write();
        state.loading = false;
        match fetched {
            Ok(batch) => {
                state.reached_end = batch.len() < self.page_size;
                if let Some(last) = batch.last() {
                    state.next_cursor = Some(last.last_interaction_at);
                }
                let existing = std::mem::take(&mut state.items);
                state.items = merge_dedupe(existing, batch);
            }
            Err(e) => {
                tracing::warn!("Failed to load friends for {}: {}", self.owner_uid, e);
                state.error = Some(e.to_string());
            }
        }
        state.clone()
    }

    /// Clear the slice and reload from the top
    pub async fn refresh(&self) -> FriendsPage {
        {
            let mut state = self.state.write();
            if state.loading {
                return state.clone();
            }
            *state = FriendsPage::default();
        }
        self.load_first_page().await
    }

    async fn fetch(&self, cursor: Option<i64>) -> Result<Vec<FriendEdge>> {
        let mut query = Query::collection(super::friends_of(&self.owner_uid))
            .order_by("lastInteractionAt", SortDirection::Descending)
            .limit(self.page_size);
        if let Some(cursor) = cursor {
            query = query.start_after(cursor);
        }
        let docs = self.db.run_query(&query).await?;
        docs.iter().map(|d| d.decode()).collect()
    }
}

/// Append `incoming` to `existing`, dropping any existing copy of an edge
/// that reappears. The incoming copy wins because it is the fresher read.
pub fn merge_dedupe(existing: Vec<FriendEdge>, incoming: Vec<FriendEdge>) -> Vec<FriendEdge> {
    let incoming_uids: HashSet<String> =
        incoming.iter().map(|e| e.friend_uid.clone()).collect();
    let mut merged: Vec<FriendEdge> = existing
        .into_iter()
        .filter(|e| !incoming_uids.contains(&e.friend_uid))
        .collect();
    merged.extend(incoming);
    merged
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::friends::friends_of;
    use serde_json::json;

    async fn seeded(count: usize) -> (Arc<Database>, String) {
        let db = Arc::new(Database::open(None).await.unwrap());
        let owner = "me".to_string();
        for i in 0..count {
            let uid = format!("friend-{:03}", i);
            let edge = json!({
                "friendUid": uid,
                "since": 1000,
                "lastInteractionAt": 1000 + i as i64,
            });
            db.put_document(&friends_of(&owner), &uid, &edge).await.unwrap();
        }
        (db, owner)
    }

    fn edge(uid: &str, at: i64) -> FriendEdge {
        FriendEdge {
            friend_uid: uid.to_string(),
            since: 0,
            last_interaction_at: at,
        }
    }

    #[tokio::test]
    async fn test_first_page_is_newest_first() {
        let (db, owner) = seeded(5).await;
        let pager = FriendListPager::new(db, owner, 3);

        let page = pager.load_first_page().await;
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].friend_uid, "friend-004");
        assert_eq!(page.items[2].friend_uid, "friend-002");
        assert_eq!(page.next_cursor, Some(1002));
        assert!(!page.reached_end);
        assert!(!page.loading);
        assert!(page.error.is_none());
    }

    #[tokio::test]
    async fn test_pagination_walks_to_the_end() {
        let (db, owner) = seeded(5).await;
        let pager = FriendListPager::new(db, owner, 2);

        pager.load_first_page().await;
        pager.load_next_page().await;
        let page = pager.load_next_page().await;

        assert_eq!(page.items.len(), 5);
        assert!(page.reached_end);
        // Strictly descending with no duplicates across page seams.
        let uids: Vec<_> = page.items.iter().map(|e| e.friend_uid.clone()).collect();
        let mut deduped = uids.clone();
        deduped.dedup();
        assert_eq!(uids, deduped);
        assert!(page
            .items
            .windows(2)
            .all(|w| w[0].last_interaction_at > w[1].last_interaction_at));

        // Loading past the end changes nothing.
        let again = pager.load_next_page().await;
        assert_eq!(again.items.len(), 5);
    }

    #[tokio::test]
    async fn test_short_first_page_reaches_end() {
        let (db, owner) = seeded(2).await;
        let pager = FriendListPager::new(db, owner, 10);

        let page = pager.load_first_page().await;
        assert_eq!(page.items.len(), 2);
        assert!(page.reached_end);
    }

    #[tokio::test]
    async fn test_refresh_resets_and_reloads() {
        let (db, owner) = seeded(5).await;
        let pager = FriendListPager::new(Arc::clone(&db), owner.clone(), 2);
        pager.load_first_page().await;
        pager.load_next_page().await;
        assert_eq!(pager.snapshot().items.len(), 4);

        // A new interaction moves an old friend to the front.
        let edge = json!({"friendUid": "friend-000", "since": 1000, "lastInteractionAt": 9999});
        db.put_document(&friends_of(&owner), "friend-000", &edge)
            .await
            .unwrap();

        let page = pager.refresh().await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].friend_uid, "friend-000");
        assert!(!page.reached_end);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_items_and_sets_error() {
        let (db, owner) = seeded(3).await;
        let pager = FriendListPager::new(Arc::clone(&db), owner.clone(), 2);
        let page = pager.load_first_page().await;
        assert_eq!(page.items.len(), 2);

        // A document the edge shape cannot decode poisons the next page.
        db.put_document(
            &friends_of(&owner),
            "broken",
            &json!({"friendUid": "broken", "lastInteractionAt": 500}),
        )
        .await
        .unwrap();

        let page = pager.load_next_page().await;
        assert!(page.error.is_some());
        assert_eq!(page.items.len(), 2);
        assert!(!page.loading);

        // The next attempt clears the error once the data is fixed.
        db.delete_document(&friends_of(&owner), "broken").await.unwrap();
        let page = pager.load_next_page().await;
        assert!(page.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_list_reaches_end_immediately() {
        let (db, _) = seeded(0).await;
        let pager = FriendListPager::new(db, "nobody", 10);

        let page = pager.load_first_page().await;
        assert!(page.items.is_empty());
        assert!(page.reached_end);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_merge_dedupe_prefers_incoming_copy() {
        let existing = vec![edge("a", 100), edge("b", 90), edge("c", 80)];
        let incoming = vec![edge("b", 70), edge("d", 60)];

        let merged = merge_dedupe(existing, incoming);
        let uids: Vec<_> = merged.iter().map(|e| e.friend_uid.as_str()).collect();
        assert_eq!(uids, ["a", "c", "b", "d"]);
        // The reappearing edge carries the freshly read timestamp.
        assert_eq!(merged[2].last_interaction_at, 70);
    }

    #[test]
    fn test_merge_dedupe_with_empty_sides() {
        let edges = vec![edge("a", 1)];
        assert_eq!(merge_dedupe(Vec::new(), edges.clone()), edges);
        assert_eq!(merge_dedupe(edges.clone(), Vec::new()), edges);
    }
}
