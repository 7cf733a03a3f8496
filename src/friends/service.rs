//! High-level social graph service.
//!
//! One `FriendsService` wraps the store-facing components behind the
//! signed-in user's point of view. Mutations require an identity and
//! surface their outcome through the [`Notifier`]; reads degrade to empty
//! results when nobody is signed in or the store misbehaves, reporting
//! infrastructure failures instead of raising them at the call site.
//!
//! Every store-touching operation runs under the configured timeout.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::collab::{
    FailureReporter, IdentityProvider, LogReporter, Notifier, NullNotifier, NullPresence,
    PresenceSource,
};
use crate::error::{Error, Result};
use crate::storage::Database;
use crate::GraphConfig;

use super::blocks::{BlockEvent, BlockRecord, BlockRegistry};
use super::edges::EdgeStore;
use super::listing::{FriendListPager, FriendsPage};
use super::presence::{merge_with_presence, FriendView, PresenceStatus};
use super::requests::{FriendRequest, RequestFeed, RequestLedger};

const TASK_IDENTITY: &str = "identity-feed";
const TASK_PRESENCE: &str = "presence-feed";

// ============================================================================
// BACKGROUND TASKS
// ============================================================================

/// Named background tasks, replaced wholesale and aborted on shutdown
struct TaskRegistry {
    entries: Mutex<HashMap<&'static str, JoinHandle<()>>>,
}

impl TaskRegistry {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, key: &'static str, handle: JoinHandle<()>) {
        if let Some(previous) = self.entries.lock().insert(key, handle) {
            previous.abort();
        }
    }

    fn cancel(&self, key: &'static str) {
        if let Some(handle) = self.entries.lock().remove(key) {
            handle.abort();
        }
    }

    fn cancel_all(&self) {
        for (_, handle) in self.entries.lock().drain() {
            handle.abort();
        }
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Social graph operations scoped to the signed-in user
pub struct FriendsService {
    db: Arc<Database>,
    config: GraphConfig,
    ledger: RequestLedger,
    edges: EdgeStore,
    blocks: BlockRegistry,
    identity: RwLock<Option<String>>,
    pager: RwLock<Option<Arc<FriendListPager>>>,
    presence: Arc<RwLock<Vec<PresenceStatus>>>,
    tasks: TaskRegistry,
    presence_source: Arc<dyn PresenceSource>,
    notifier: Arc<dyn Notifier>,
    reporter: Arc<dyn FailureReporter>,
}

impl FriendsService {
    /// Build a service over an open database. No user is bound yet;
    /// call [`set_identity`](Self::set_identity) or
    /// [`bind_identity`](Self::bind_identity) from inside a runtime.
    pub fn new(db: Arc<Database>, config: GraphConfig) -> Self {
        Self {
            ledger: RequestLedger::new(Arc::clone(&db), config.request_ttl),
            edges: EdgeStore::new(Arc::clone(&db)),
            blocks: BlockRegistry::new(Arc::clone(&db)),
            identity: RwLock::new(None),
            pager: RwLock::new(None),
            presence: Arc::new(RwLock::new(Vec::new())),
            tasks: TaskRegistry::new(),
            presence_source: Arc::new(NullPresence),
            notifier: Arc::new(NullNotifier),
            reporter: Arc::new(LogReporter),
            config,
            db,
        }
    }

    /// Replace the presence source used for friend list enrichment
    pub fn with_presence_source(mut self, source: Arc<dyn PresenceSource>) -> Self {
        self.presence_source = source;
        self
    }

    /// Replace the sink for user-facing outcome messages
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the sink for infrastructure failures
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// The tunables this service was built with
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    /// Follow an identity provider, rebinding on every change it pushes
    pub fn bind_identity(self: &Arc<Self>, provider: Arc<dyn IdentityProvider>) {
        let weak = Arc::downgrade(self);
        let mut stream = provider.identity_stream();
        let handle = tokio::spawn(async move {
            while let Some(uid) = stream.next().await {
                let Some(service) = weak.upgrade() else { break };
                service.set_identity(uid.as_deref());
            }
        });
        self.tasks.insert(TASK_IDENTITY, handle);
    }

    /// Bind to `uid`, or unbind with `None`.
    ///
    /// Rebinding drops the previous user's pager and cached presence and
    /// restarts the presence feed for the new user.
    pub fn set_identity(&self, uid: Option<&str>) {
        {
            let mut current = self.identity.write();
            if current.as_deref() == uid {
                return;
            }
            *current = uid.map(str::to_string);
        }

        self.tasks.cancel(TASK_PRESENCE);
        self.presence.write().clear();
        match uid {
            Some(uid) => {
                *self.pager.write() = Some(Arc::new(FriendListPager::new(
                    Arc::clone(&self.db),
                    uid,
                    self.config.page_size,
                )));
                self.spawn_presence_feed();
                tracing::info!("Friends service bound to {}", uid);
            }
            None => {
                *self.pager.write() = None;
                tracing::info!("Friends service unbound");
            }
        }
    }

    /// Uid of the signed-in user, if any
    pub fn current_uid(&self) -> Option<String> {
        self.identity.read().clone()
    }

    fn require_identity(&self) -> Result<String> {
        self.identity.read().clone().ok_or(Error::NoIdentity)
    }

    fn spawn_presence_feed(&self) {
        let source = Arc::clone(&self.presence_source);
        let cache = Arc::clone(&self.presence);
        let reporter = Arc::clone(&self.reporter);
        let handle = tokio::spawn(async move {
            match source.presence_stream().await {
                Ok(mut stream) => {
                    while let Some(batch) = stream.next().await {
                        *cache.write() = batch;
                    }
                }
                Err(e) => reporter.report("presence subscription", &e),
            }
        });
        self.tasks.insert(TASK_PRESENCE, handle);
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Send a friend request from the signed-in user to `target`
    pub async fn send_request(
        &self,
        target: &str,
        message: Option<String>,
    ) -> Result<FriendRequest> {
        let me = self.require_identity()?;
        match self.bounded(self.ledger.send_request(&me, target, message)).await {
            Ok(request) => {
                self.notifier.success("Friend request sent.");
                Ok(request)
            }
            Err(e) => Err(self.fail("send friend request", e)),
        }
    }

    /// Accept a pending request addressed to the signed-in user
    pub async fn accept_request(&self, request_id: &str) -> Result<()> {
        let me = self.require_identity()?;
        let request = self.addressed_to(&me, request_id).await?;
        match self
            .bounded(self.ledger.accept_request(
                request_id,
                &request.requester_uid,
                &request.target_uid,
            ))
            .await
        {
            Ok(()) => {
                self.notifier.success("Friend request accepted.");
                Ok(())
            }
            Err(e) => Err(self.fail("accept friend request", e)),
        }
    }

    /// Decline a pending request addressed to the signed-in user
    pub async fn decline_request(&self, request_id: &str) -> Result<()> {
        let me = self.require_identity()?;
        self.addressed_to(&me, request_id).await?;
        match self.bounded(self.ledger.decline_request(request_id)).await {
            Ok(()) => {
                self.notifier.info("Friend request declined.");
                Ok(())
            }
            Err(e) => Err(self.fail("decline friend request", e)),
        }
    }

    /// Decline and suppress re-requests for the configured cooldown window
    pub async fn decline_request_with_cooldown(&self, request_id: &str) -> Result<()> {
        let me = self.require_identity()?;
        self.addressed_to(&me, request_id).await?;
        let window = self.config.decline_cooldown;
        match self
            .bounded(self.ledger.decline_request_with_cooldown(request_id, window))
            .await
        {
            Ok(()) => {
                self.notifier.info("Friend request declined.");
                Ok(())
            }
            Err(e) => Err(self.fail("decline friend request", e)),
        }
    }

    /// Withdraw a pending request the signed-in user sent
    pub async fn cancel_request(&self, request_id: &str) -> Result<()> {
        let me = self.require_identity()?;
        match self.bounded(self.ledger.cancel_request(request_id, &me)).await {
            Ok(()) => {
                self.notifier.info("Friend request cancelled.");
                Ok(())
            }
            Err(e) => Err(self.fail("cancel friend request", e)),
        }
    }

    /// End the friendship with `target`, removing both mirrored edges
    pub async fn remove_friend(&self, target: &str) -> Result<()> {
        let me = self.require_identity()?;
        let result = self
            .bounded(self.db.run_atomic(|tx| {
                if !EdgeStore::remove_mirrored(tx, &me, target)? {
                    return Err(Error::NotFriends);
                }
                Ok(())
            }))
            .await;
        match result {
            Ok(()) => {
                self.notifier.info("Friend removed.");
                Ok(())
            }
            Err(e) => Err(self.fail("remove friend", e)),
        }
    }

    /// Record an interaction with `friend`, moving them up the list
    pub async fn touch_interaction(&self, friend: &str) -> Result<()> {
        let me = self.require_identity()?;
        self.bounded(self.edges.touch_interaction(&me, friend))
            .await
            .map_err(|e| self.fail("record interaction", e))
    }

    /// Block `target`.
    ///
    /// The block state is written first and is authoritative. Afterwards
    /// the friendship is severed and pending requests between the two
    /// users are resolved; failures in that cleanup are reported but do
    /// not undo the block.
    pub async fn block_user(&self, target: &str, reason: Option<String>) -> Result<BlockRecord> {
        let me = self.require_identity()?;
        let record = match self.bounded(self.blocks.block_user(&me, target, reason)).await {
            Ok(record) => record,
            Err(e) => return Err(self.fail("block user", e)),
        };

        if let Err(e) = self.sever_after_block(&me, target).await {
            self.reporter.report("block cleanup", &e);
        }
        self.notifier.info("User blocked.");
        Ok(record)
    }

    /// Lift the signed-in user's block on `target`
    pub async fn unblock_user(&self, target: &str) -> Result<bool> {
        let me = self.require_identity()?;
        match self.bounded(self.blocks.unblock_user(&me, target)).await {
            Ok(lifted) => {
                if lifted {
                    self.notifier.info("User unblocked.");
                }
                Ok(lifted)
            }
            Err(e) => Err(self.fail("unblock user", e)),
        }
    }

    /// Mark overdue pending requests expired, for the host's scheduler
    pub async fn expire_overdue_requests(&self) -> Result<usize> {
        self.bounded(self.ledger.expire_overdue())
            .await
            .map_err(|e| self.fail("expire friend requests", e))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// True when the signed-in user is friends with `uid`
    pub async fn is_friend(&self, uid: &str) -> Result<bool> {
        match self.current_uid() {
            Some(me) => self.bounded(self.edges.are_friends(&me, uid)).await,
            None => Ok(false),
        }
    }

    /// True when the signed-in user blocks `uid`
    pub async fn is_blocked(&self, uid: &str) -> Result<bool> {
        match self.current_uid() {
            Some(me) => self.bounded(self.blocks.is_blocked(&me, uid)).await,
            None => Ok(false),
        }
    }

    /// Pending requests addressed to the signed-in user, newest first
    pub async fn incoming_requests(&self) -> Vec<FriendRequest> {
        let Some(me) = self.current_uid() else {
            return Vec::new();
        };
        match self.bounded(self.ledger.list_inbound(&me)).await {
            Ok(requests) => requests,
            Err(e) => self.degrade("list incoming requests", e),
        }
    }

    /// Pending requests the signed-in user sent, newest first
    pub async fn outgoing_requests(&self) -> Vec<FriendRequest> {
        let Some(me) = self.current_uid() else {
            return Vec::new();
        };
        match self.bounded(self.ledger.list_outbound(&me)).await {
            Ok(requests) => requests,
            Err(e) => self.degrade("list outgoing requests", e),
        }
    }

    /// Number of pending inbound requests, for badge display
    pub async fn pending_badge_count(&self) -> usize {
        let Some(me) = self.current_uid() else {
            return 0;
        };
        match self.bounded(self.ledger.pending_inbound_count(&me)).await {
            Ok(count) => count,
            Err(e) => self.degrade("count incoming requests", e),
        }
    }

    /// Everyone the signed-in user blocks
    pub async fn blocked_users(&self) -> Vec<BlockRecord> {
        let Some(me) = self.current_uid() else {
            return Vec::new();
        };
        match self.bounded(self.blocks.list_blocked(&me)).await {
            Ok(records) => records,
            Err(e) => self.degrade("list blocked users", e),
        }
    }

    /// Audit trail for the signed-in user's block on `target`, oldest first
    pub async fn block_history(&self, target: &str) -> Vec<BlockEvent> {
        let Some(me) = self.current_uid() else {
            return Vec::new();
        };
        match self.bounded(self.blocks.block_history(&me, target)).await {
            Ok(events) => events,
            Err(e) => self.degrade("read block history", e),
        }
    }

    /// Live feed of pending inbound requests. Without a signed-in user the
    /// feed is already closed and yields nothing.
    pub async fn watch_incoming_requests(&self) -> Result<RequestFeed> {
        let Some(me) = self.current_uid() else {
            return Ok(RequestFeed::empty());
        };
        self.bounded(self.ledger.watch_inbound(&me))
            .await
            .map_err(|e| self.fail("watch incoming requests", e))
    }

    // ========================================================================
    // FRIEND LIST
    // ========================================================================

    /// Load the first page of the signed-in user's friends
    pub async fn load_first_friends_page(&self) -> FriendsPage {
        match self.pager() {
            Some(pager) => pager.load_first_page().await,
            None => FriendsPage::default(),
        }
    }

    /// Load and append the next page
    pub async fn load_next_friends_page(&self) -> FriendsPage {
        match self.pager() {
            Some(pager) => pager.load_next_page().await,
            None => FriendsPage::default(),
        }
    }

    /// Clear the list and reload from the top
    pub async fn refresh_friends(&self) -> FriendsPage {
        match self.pager() {
            Some(pager) => pager.refresh().await,
            None => FriendsPage::default(),
        }
    }

    /// Currently loaded list state without touching the store
    pub fn friends_page(&self) -> FriendsPage {
        match self.pager() {
            Some(pager) => pager.snapshot(),
            None => FriendsPage::default(),
        }
    }

    /// Loaded friends with the latest presence batch laid over them
    pub fn enriched_friends(&self) -> Vec<FriendView> {
        let page = self.friends_page();
        let statuses = self.presence.read().clone();
        let views = page.items.iter().map(FriendView::offline).collect();
        merge_with_presence(views, &statuses)
    }

    // ========================================================================
    // INTERNAL
    // ========================================================================

    fn pager(&self) -> Option<Arc<FriendListPager>> {
        self.pager.read().clone()
    }

    /// Fetch a request and check it is addressed to `me`. Requests aimed
    /// at someone else read as unknown.
    async fn addressed_to(&self, me: &str, request_id: &str) -> Result<FriendRequest> {
        let request = self
            .bounded(self.ledger.get_request(request_id))
            .await
            .map_err(|e| self.fail("load friend request", e))?
            .ok_or(Error::RequestNotFound)?;
        if request.target_uid != me {
            return Err(Error::RequestNotFound);
        }
        Ok(request)
    }

    async fn sever_after_block(&self, me: &str, target: &str) -> Result<()> {
        self.bounded(self.db.run_atomic(|tx| {
            EdgeStore::remove_mirrored(tx, me, target)?;
            Ok(())
        }))
        .await?;

        let pending = self
            .bounded(self.ledger.pending_between_users(me, target))
            .await?;
        for request in pending {
            if request.target_uid == me {
                self.bounded(self.ledger.decline_request(&request.id)).await?;
            } else {
                self.bounded(self.ledger.cancel_request(&request.id, me)).await?;
            }
        }
        Ok(())
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.op_timeout, fut).await?
    }

    /// Route a mutation failure: infrastructure errors reach the reporter
    /// and raise a generic toast, graph outcomes pass through untouched.
    fn fail(&self, context: &str, error: Error) -> Error {
        if !error.is_graph_outcome() {
            self.reporter.report(context, &error);
            self.notifier.error("Something went wrong. Please try again.");
        }
        error
    }

    /// Route a read failure: report it, hand back an empty value
    fn degrade<T: Default>(&self, context: &str, error: Error) -> T {
        if !error.is_graph_outcome() {
            self.reporter.report(context, &error);
        }
        T::default()
    }
}

impl Drop for FriendsService {
    fn drop(&mut self) {
        self.tasks.cancel_all();
    }
}

// ============================================================================
// TESTS
// ============================================================================
