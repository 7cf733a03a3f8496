//! Friend request lifecycle.
//!
//! Requests move through a closed state machine: `pending` is the only
//! state that can transition, to `accepted`, `declined`, or `expired`.
//! Cancellation deletes the record outright. Every transition runs inside
//! one transaction that re-reads the request first, so two racing accepts
//! resolve to exactly one winner.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage::{Atomic, Database, Document, Query, SortDirection, Subscription};
use crate::time::now_timestamp_millis;

use super::blocks::BlockRegistry;
use super::cooldown::CooldownGuard;
use super::edges::EdgeStore;

// ============================================================================
// TYPES
// ============================================================================

/// Lifecycle state of a friend request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Awaiting a response from the target
    Pending,
    /// The target accepted, the friendship edges exist
    Accepted,
    /// The target declined
    Declined,
    /// Sat pending past its expiry and was swept
    Expired,
}

impl RequestStatus {
    /// Wire representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
            RequestStatus::Expired => "expired",
        }
    }

    /// Parse a wire status, `None` for anything unknown
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "declined" => Some(RequestStatus::Declined),
            "expired" => Some(RequestStatus::Expired),
            _ => None,
        }
    }
}

/// One friend request record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Stable request id
    pub id: String,
    /// Who sent the request
    pub requester_uid: String,
    /// Who it is addressed to
    pub target_uid: String,
    /// Optional note shown to the target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Where the request sits in its lifecycle
    pub status: RequestStatus,
    /// When the request was created (epoch millis)
    pub created_at: i64,
    /// When the target accepted or declined (epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<i64>,
    /// Set alongside `responded_at` on accept only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<i64>,
    /// After this instant the sweep marks the request expired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

// ============================================================================
// REQUEST LEDGER
// ============================================================================

/// Creates and resolves friend requests
pub struct RequestLedger {
    db: Arc<Database>,
    request_ttl: Duration,
}

impl RequestLedger {
    /// Build a ledger over an open database
    pub fn new(db: Arc<Database>, request_ttl: Duration) -> Self {
        Self { db, request_ttl }
    }

    /// Create a pending request from `requester` to `target`.
    ///
    /// The relationship guards run in validation order: self-request,
    /// existing friendship, a block in either direction, an active cooldown,
    /// then a duplicate pending request along the same direction. All guards
    /// and the insert share one transaction.
    pub async fn send_request(
        &self,
        requester: &str,
        target: &str,
        message: Option<String>,
    ) -> Result<FriendRequest> {
        if requester == target {
            return Err(Error::CannotRequestSelf);
        }

        let ttl_millis = self.request_ttl.as_millis() as i64;
        let request = self
            .db
            .run_atomic(|tx| {
                if EdgeStore::edge_in(tx, requester, target)?.is_some() {
                    return Err(Error::AlreadyFriends);
                }
                if BlockRegistry::is_blocked_in(tx, requester, target)? {
                    return Err(Error::BlockedByMe);
                }
                if BlockRegistry::is_blocked_in(tx, target, requester)? {
                    return Err(Error::BlockedByTarget);
                }
                if let Some(cooldown) = CooldownGuard::read_in(tx, requester, target)? {
                    if now_timestamp_millis() < cooldown.until {
                        return Err(Error::CooldownActive { until: cooldown.until });
                    }
                }
                if !pending_between_in(tx, requester, target)?.is_empty() {
                    return Err(Error::RequestPending);
                }

                let now = now_timestamp_millis();
                let request = FriendRequest {
                    id: Uuid::new_v4().to_string(),
                    requester_uid: requester.to_string(),
                    target_uid: target.to_string(),
                    message: message.clone(),
                    status: RequestStatus::Pending,
                    created_at: now,
                    responded_at: None,
                    accepted_at: None,
                    expires_at: Some(now.saturating_add(ttl_millis)),
                };
                tx.write(
                    super::FRIEND_REQUESTS,
                    &request.id,
                    &serde_json::to_value(&request)?,
                )?;
                Ok(request)
            })
            .await?;

        tracing::info!("Friend request {} sent to {}", request.id, target);
        Ok(request)
    }

    /// Fetch one request by id
    pub async fn get_request(&self, request_id: &str) -> Result<Option<FriendRequest>> {
        let doc = self.db.get_document(super::FRIEND_REQUESTS, request_id).await?;
        doc.map(|d| d.decode()).transpose()
    }

    /// Accept a pending request, creating the mirrored friendship edges.
    ///
    /// The request is re-read inside the transaction, so of two racing
    /// accepts only the first can succeed. The caller passes the expected
    /// requester and target; a mismatch reads as an unknown request.
    pub async fn accept_request(
        &self,
        request_id: &str,
        requester: &str,
        target: &str,
    ) -> Result<()> {
        self.db
            .run_atomic(|tx| {
                let mut request: FriendRequest = tx
                    .read(super::FRIEND_REQUESTS, request_id)?
                    .ok_or(Error::RequestNotFound)?
                    .decode()?;
                if request.requester_uid != requester || request.target_uid != target {
                    return Err(Error::RequestNotFound);
                }
                if request.status != RequestStatus::Pending {
                    return Err(Error::RequestNotPending);
                }
                if EdgeStore::edge_in(tx, requester, target)?.is_some()
                    || EdgeStore::edge_in(tx, target, requester)?.is_some()
                {
                    return Err(Error::AlreadyFriends);
                }

                let now = now_timestamp_millis();
                EdgeStore::write_mirrored(tx, requester, target, now)?;
                request.status = RequestStatus::Accepted;
                request.responded_at = Some(now);
                request.accepted_at = Some(now);
                tx.write(
                    super::FRIEND_REQUESTS,
                    request_id,
                    &serde_json::to_value(&request)?,
                )?;
                Ok(())
            })
            .await?;

        tracing::info!("Friend request {} accepted", request_id);
        Ok(())
    }

    /// Decline a pending request with no re-request suppression
    pub async fn decline_request(&self, request_id: &str) -> Result<()> {
        self.decline_inner(request_id, None).await
    }

    /// Decline a pending request and suppress re-requests along the same
    /// direction for `window`. The cooldown is written in the same
    /// transaction as the status change.
    pub async fn decline_request_with_cooldown(
        &self,
        request_id: &str,
        window: Duration,
    ) -> Result<()> {
        self.decline_inner(request_id, Some(window)).await
    }

    async fn decline_inner(&self, request_id: &str, cooldown: Option<Duration>) -> Result<()> {
        self.db
            .run_atomic(|tx| {
                let mut request: FriendRequest = tx
                    .read(super::FRIEND_REQUESTS, request_id)?
                    .ok_or(Error::RequestNotFound)?
                    .decode()?;
                if request.status != RequestStatus::Pending {
                    return Err(Error::RequestNotPending);
                }

                let now = now_timestamp_millis();
                request.status = RequestStatus::Declined;
                request.responded_at = Some(now);
                tx.write(
                    super::FRIEND_REQUESTS,
                    request_id,
                    &serde_json::to_value(&request)?,
                )?;
                if let Some(window) = cooldown {
                    let until = now.saturating_add(window.as_millis() as i64);
                    CooldownGuard::write_in(tx, &request.requester_uid, &request.target_uid, until)?;
                }
                Ok(())
            })
            .await?;

        tracing::info!("Friend request {} declined", request_id);
        Ok(())
    }

    /// Withdraw a pending request. Only the requester may cancel, and the
    /// record is deleted rather than resolved.
    pub async fn cancel_request(&self, request_id: &str, requester: &str) -> Result<()> {
        self.db
            .run_atomic(|tx| {
                let request: FriendRequest = tx
                    .read(super::FRIEND_REQUESTS, request_id)?
                    .ok_or(Error::RequestNotFound)?
                    .decode()?;
                if request.requester_uid != requester {
                    return Err(Error::RequestNotFound);
                }
                if request.status != RequestStatus::Pending {
                    return Err(Error::RequestNotPending);
                }
                tx.delete(super::FRIEND_REQUESTS, request_id)?;
                Ok(())
            })
            .await?;

        tracing::info!("Friend request {} cancelled", request_id);
        Ok(())
    }

    /// Pending requests addressed to `uid`, newest first
    pub async fn list_inbound(&self, uid: &str) -> Result<Vec<FriendRequest>> {
        let docs = self.db.run_query(&inbound_query(uid)).await?;
        decode_requests(&docs)
    }

    /// Pending requests sent by `uid`, newest first
    pub async fn list_outbound(&self, uid: &str) -> Result<Vec<FriendRequest>> {
        let query = Query::collection(super::FRIEND_REQUESTS)
            .where_eq("requesterUid", uid)
            .where_eq("status", RequestStatus::Pending.as_str())
            .order_by("createdAt", SortDirection::Descending);
        let docs = self.db.run_query(&query).await?;
        decode_requests(&docs)
    }

    /// Number of pending requests addressed to `uid`
    pub async fn pending_inbound_count(&self, uid: &str) -> Result<usize> {
        Ok(self.list_inbound(uid).await?.len())
    }

    /// Pending requests between `a` and `b` in either direction
    pub async fn pending_between_users(&self, a: &str, b: &str) -> Result<Vec<FriendRequest>> {
        let forward = self.db.run_query(&pending_pair_query(a, b)).await?;
        let backward = self.db.run_query(&pending_pair_query(b, a)).await?;
        let mut requests = decode_requests(&forward)?;
        requests.extend(decode_requests(&backward)?);
        Ok(requests)
    }

    /// Mark every overdue pending request expired. Returns how many changed.
    pub async fn expire_overdue(&self) -> Result<usize> {
        let query = Query::collection(super::FRIEND_REQUESTS)
            .where_eq("status", RequestStatus::Pending.as_str())
            .where_range("expiresAt", 0, now_timestamp_millis());
        let expired = self
            .db
            .run_atomic(move |tx| {
                let docs = tx.query(&query)?;
                for doc in &docs {
                    let mut request: FriendRequest = doc.decode()?;
                    request.status = RequestStatus::Expired;
                    tx.write(
                        super::FRIEND_REQUESTS,
                        &request.id,
                        &serde_json::to_value(&request)?,
                    )?;
                }
                Ok(docs.len())
            })
            .await?;

        if expired > 0 {
            tracing::info!("Expired {} overdue friend requests", expired);
        }
        Ok(expired)
    }

    /// Live feed of `uid`'s pending inbound requests. The first snapshot
    /// arrives immediately, then one per change to the request collection.
    pub async fn watch_inbound(&self, uid: &str) -> Result<RequestFeed> {
        let subscription = self.db.watch_query(inbound_query(uid)).await?;
        Ok(RequestFeed::new(subscription))
    }
}

fn inbound_query(uid: &str) -> Query {
    Query::collection(super::FRIEND_REQUESTS)
        .where_eq("targetUid", uid)
        .where_eq("status", RequestStatus::Pending.as_str())
        .order_by("createdAt", SortDirection::Descending)
}

fn pending_pair_query(requester: &str, target: &str) -> Query {
    Query::collection(super::FRIEND_REQUESTS)
        .where_eq("requesterUid", requester)
        .where_eq("targetUid", target)
        .where_eq("status", RequestStatus::Pending.as_str())
}

fn pending_between_in(tx: &Atomic<'_>, requester: &str, target: &str) -> Result<Vec<FriendRequest>> {
    decode_requests(&tx.query(&pending_pair_query(requester, target))?)
}

fn decode_requests(docs: &[Document]) -> Result<Vec<FriendRequest>> {
    docs.iter().map(|d| d.decode()).collect()
}

// ============================================================================
// REQUEST FEED
// ============================================================================

/// Subscription handle yielding pending-inbound snapshots
pub struct RequestFeed {
    inner: Subscription,
}

impl RequestFeed {
    pub(crate) fn new(inner: Subscription) -> Self {
        Self { inner }
    }

    /// A feed that yields nothing, handed out when no user is signed in
    pub(crate) fn empty() -> Self {
        Self {
            inner: Subscription::closed(),
        }
    }

    /// Next snapshot, or `None` once the feed is cancelled
    pub async fn recv(&mut self) -> Option<Vec<FriendRequest>> {
        while let Some(docs) = self.inner.recv().await {
            match decode_requests(&docs) {
                Ok(requests) => return Some(requests),
                Err(e) => {
                    tracing::warn!("Dropping undecodable request snapshot: {}", e);
                }
            }
        }
        None
    }

    /// Stop receiving snapshots
    pub fn cancel(&mut self) {
        self.inner.cancel();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    const TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);

    async fn ledger() -> (Arc<Database>, RequestLedger) {
        let db = Arc::new(Database::open(None).await.unwrap());
        let ledger = RequestLedger::new(Arc::clone(&db), TTL);
        (db, ledger)
    }

    #[tokio::test]
    async fn test_send_creates_pending_request() {
        let (_db, ledger) = ledger().await;
        let request = ledger
            .send_request("alice", "bob", Some("hi!".to_string()))
            .await
            .unwrap();

        assert_eq!(request.requester_uid, "alice");
        assert_eq!(request.target_uid, "bob");
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.message.as_deref(), Some("hi!"));
        assert_eq!(
            request.expires_at,
            Some(request.created_at + TTL.as_millis() as i64)
        );
        assert!(request.responded_at.is_none());

        let stored = ledger.get_request(&request.id).await.unwrap().unwrap();
        assert_eq!(stored, request);
    }

    #[tokio::test]
    async fn test_send_to_self_is_rejected() {
        let (_db, ledger) = ledger().await;
        let result = ledger.send_request("alice", "alice", None).await;
        assert!(matches!(result, Err(Error::CannotRequestSelf)));
    }

    #[tokio::test]
    async fn test_send_when_already_friends_is_rejected() {
        let (db, ledger) = ledger().await;
        db.run_atomic(|tx| EdgeStore::write_mirrored(tx, "alice", "bob", 1000))
            .await
            .unwrap();

        let result = ledger.send_request("alice", "bob", None).await;
        assert!(matches!(result, Err(Error::AlreadyFriends)));
    }

    #[tokio::test]
    async fn test_send_respects_blocks_in_both_directions() {
        let (db, ledger) = ledger().await;
        let blocks = BlockRegistry::new(Arc::clone(&db));

        blocks.block_user("alice", "bob", None).await.unwrap();
        let result = ledger.send_request("alice", "bob", None).await;
        assert!(matches!(result, Err(Error::BlockedByMe)));
        blocks.unblock_user("alice", "bob").await.unwrap();

        blocks.block_user("bob", "alice", None).await.unwrap();
        let result = ledger.send_request("alice", "bob", None).await;
        assert!(matches!(result, Err(Error::BlockedByTarget)));
    }

    #[tokio::test]
    async fn test_duplicate_pending_is_rejected() {
        let (_db, ledger) = ledger().await;
        ledger.send_request("alice", "bob", None).await.unwrap();

        let result = ledger.send_request("alice", "bob", None).await;
        assert!(matches!(result, Err(Error::RequestPending)));
    }

    #[tokio::test]
    async fn test_reverse_direction_request_is_allowed() {
        let (_db, ledger) = ledger().await;
        ledger.send_request("alice", "bob", None).await.unwrap();

        // The duplicate guard covers the exact direction only.
        let reverse = ledger.send_request("bob", "alice", None).await;
        assert!(reverse.is_ok());
    }

    #[tokio::test]
    async fn test_send_during_cooldown_is_rejected() {
        let (db, ledger) = ledger().await;
        let cooldowns = CooldownGuard::new(Arc::clone(&db));
        let until = now_timestamp_millis() + 60_000;
        cooldowns.set_cooldown("alice", "bob", until).await.unwrap();

        let result = ledger.send_request("alice", "bob", None).await;
        assert!(matches!(result, Err(Error::CooldownActive { until: u }) if u == until));

        // An expired window no longer suppresses.
        cooldowns
            .set_cooldown("alice", "bob", now_timestamp_millis() - 1)
            .await
            .unwrap();
        assert!(ledger.send_request("alice", "bob", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_accept_mirrors_edges_and_resolves_request() {
        let (db, ledger) = ledger().await;
        let edges = EdgeStore::new(Arc::clone(&db));
        let request = ledger.send_request("alice", "bob", None).await.unwrap();

        ledger
            .accept_request(&request.id, "alice", "bob")
            .await
            .unwrap();

        let forward = edges.edge("alice", "bob").await.unwrap().unwrap();
        let backward = edges.edge("bob", "alice").await.unwrap().unwrap();
        assert_eq!(forward.since, backward.since);
        assert_eq!(forward.last_interaction_at, backward.last_interaction_at);

        let resolved = ledger.get_request(&request.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, RequestStatus::Accepted);
        assert_eq!(resolved.responded_at, resolved.accepted_at);
        assert_eq!(resolved.accepted_at, Some(forward.since));
    }

    #[tokio::test]
    async fn test_accept_unknown_or_mismatched_request() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();

        let missing = ledger.accept_request("no-such-id", "alice", "bob").await;
        assert!(matches!(missing, Err(Error::RequestNotFound)));

        // Wrong pair reads as an unknown request, and nothing changes.
        let mismatched = ledger.accept_request(&request.id, "alice", "carol").await;
        assert!(matches!(mismatched, Err(Error::RequestNotFound)));
        let stored = ledger.get_request(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_accept_resolved_request_is_rejected() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();
        ledger.decline_request(&request.id).await.unwrap();

        let result = ledger.accept_request(&request.id, "alice", "bob").await;
        assert!(matches!(result, Err(Error::RequestNotPending)));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_have_one_winner() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();

        let (first, second) = tokio::join!(
            ledger.accept_request(&request.id, "alice", "bob"),
            ledger.accept_request(&request.id, "alice", "bob"),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(loser, Err(Error::RequestNotPending)));
    }

    #[tokio::test]
    async fn test_accept_when_edges_already_exist() {
        let (db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();
        db.run_atomic(|tx| EdgeStore::write_mirrored(tx, "alice", "bob", 1000))
            .await
            .unwrap();

        let result = ledger.accept_request(&request.id, "alice", "bob").await;
        assert!(matches!(result, Err(Error::AlreadyFriends)));

        // The failed accept rolled back, the request is still pending.
        let stored = ledger.get_request(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_plain_decline_allows_immediate_resend() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();
        ledger.decline_request(&request.id).await.unwrap();

        let declined = ledger.get_request(&request.id).await.unwrap().unwrap();
        assert_eq!(declined.status, RequestStatus::Declined);
        assert!(declined.responded_at.is_some());
        assert!(declined.accepted_at.is_none());

        assert!(ledger.send_request("alice", "bob", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_decline_with_cooldown_suppresses_resend() {
        let (db, ledger) = ledger().await;
        let cooldowns = CooldownGuard::new(Arc::clone(&db));
        let request = ledger.send_request("alice", "bob", None).await.unwrap();

        ledger
            .decline_request_with_cooldown(&request.id, Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(cooldowns.is_active("alice", "bob").await.unwrap());
        let result = ledger.send_request("alice", "bob", None).await;
        assert!(matches!(result, Err(Error::CooldownActive { .. })));

        // The other direction stays open.
        assert!(ledger.send_request("bob", "alice", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_deletes_pending_request() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();

        ledger.cancel_request(&request.id, "alice").await.unwrap();
        assert!(ledger.get_request(&request.id).await.unwrap().is_none());

        // Gone means a fresh request is allowed.
        assert!(ledger.send_request("alice", "bob", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_requires_the_requester() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();

        let result = ledger.cancel_request(&request.id, "bob").await;
        assert!(matches!(result, Err(Error::RequestNotFound)));
        assert!(ledger.get_request(&request.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancel_resolved_request_is_rejected() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();
        ledger.accept_request(&request.id, "alice", "bob").await.unwrap();

        let result = ledger.cancel_request(&request.id, "alice").await;
        assert!(matches!(result, Err(Error::RequestNotPending)));
    }

    #[tokio::test]
    async fn test_lists_are_scoped_and_newest_first() {
        let (_db, ledger) = ledger().await;
        ledger.send_request("alice", "dave", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        ledger.send_request("bob", "dave", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        ledger.send_request("carol", "dave", None).await.unwrap();
        ledger.send_request("dave", "erin", None).await.unwrap();

        let inbound = ledger.list_inbound("dave").await.unwrap();
        assert_eq!(inbound.len(), 3);
        assert_eq!(inbound[0].requester_uid, "carol");
        assert_eq!(inbound[2].requester_uid, "alice");
        assert_eq!(ledger.pending_inbound_count("dave").await.unwrap(), 3);

        let outbound = ledger.list_outbound("dave").await.unwrap();
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].target_uid, "erin");
    }

    #[tokio::test]
    async fn test_resolved_requests_leave_the_lists() {
        let (_db, ledger) = ledger().await;
        let request = ledger.send_request("alice", "bob", None).await.unwrap();
        ledger.accept_request(&request.id, "alice", "bob").await.unwrap();

        assert!(ledger.list_inbound("bob").await.unwrap().is_empty());
        assert!(ledger.list_outbound("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_between_covers_both_directions() {
        let (_db, ledger) = ledger().await;
        ledger.send_request("alice", "bob", None).await.unwrap();
        ledger.send_request("bob", "alice", None).await.unwrap();
        ledger.send_request("alice", "carol", None).await.unwrap();

        let between = ledger.pending_between_users("alice", "bob").await.unwrap();
        assert_eq!(between.len(), 2);
    }

    #[tokio::test]
    async fn test_expire_overdue_flips_only_overdue_pending() {
        let (db, ledger) = ledger().await;
        // A ledger with no grace period writes requests already overdue.
        let instant = RequestLedger::new(Arc::clone(&db), Duration::ZERO);
        let stale = instant.send_request("alice", "bob", None).await.unwrap();
        let fresh = ledger.send_request("carol", "bob", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let expired = ledger.expire_overdue().await.unwrap();
        assert_eq!(expired, 1);

        let stale = ledger.get_request(&stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, RequestStatus::Expired);
        assert!(stale.responded_at.is_none());
        let fresh = ledger.get_request(&fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, RequestStatus::Pending);

        // Expired requests no longer show up inbound.
        let inbound = ledger.list_inbound("bob").await.unwrap();
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].id, fresh.id);
    }

    #[tokio::test]
    async fn test_watch_inbound_tracks_changes() {
        let (_db, ledger) = ledger().await;
        let mut feed = ledger.watch_inbound("bob").await.unwrap();

        let initial = feed.recv().await.unwrap();
        assert!(initial.is_empty());

        let request = ledger.send_request("alice", "bob", None).await.unwrap();
        let snapshot = feed.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, request.id);

        ledger.accept_request(&request.id, "alice", "bob").await.unwrap();
        let snapshot = feed.recv().await.unwrap();
        assert!(snapshot.is_empty());

        feed.cancel();
        assert!(feed.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_feed_yields_nothing() {
        let mut feed = RequestFeed::empty();
        assert!(feed.recv().await.is_none());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Declined,
            RequestStatus::Expired,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("cancelled"), None);
    }
}
