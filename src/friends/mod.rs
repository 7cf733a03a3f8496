//! # Friends Module
//!
//! Social graph management: friend requests, friendship edges, blocking,
//! re-request cooldowns, and paginated friend listing.
//!
//! ## Friend Request Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      FRIEND REQUEST FLOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Alice (Requester)                           Bob (Target)               │
//! │  ─────────────────────────────────────────────────────────────          │
//! │                                                                         │
//! │  1. send_request(bob)                                                   │
//! │  ┌─────────────────────┐                                                │
//! │  │ Checks (in order):  │                                                │
//! │  │ • not herself       │                                                │
//! │  │ • not already       │                                                │
//! │  │   friends           │                                                │
//! │  │ • neither side      │                                                │
//! │  │   blocked           │                                                │
//! │  │ • no cooldown       │                                                │
//! │  │ • no pending dup    │                                                │
//! │  └──────────┬──────────┘                                                │
//! │             │ all pass                                                  │
//! │             ▼                                                           │
//! │  ┌─────────────────────┐                                                │
//! │  │ FriendRequest {     │                                                │
//! │  │   status: pending   │  ────────────────────►  2. Bob sees it in      │
//! │  │ }                   │                            his inbound list    │
//! │  └─────────────────────┘                                 │              │
//! │                                                          ▼              │
//! │                                              3. accept / decline /      │
//! │                                                 (Alice may cancel)      │
//! │                                                          │              │
//! │             ◄────────────────────────────────────────────┘              │
//! │  4. On accept, one atomic transaction:                                  │
//! │  ┌─────────────────────────────────────────────────────────────┐        │
//! │  │  • request must still be pending                            │        │
//! │  │  • neither mirrored edge may already exist                  │        │
//! │  │  • users/alice/friends/bob   written                        │        │
//! │  │  • users/bob/friends/alice   written (same timestamps)      │        │
//! │  │  • request status → accepted                                │        │
//! │  └─────────────────────────────────────────────────────────────┘        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Relationship Data
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      RELATIONSHIP COLLECTIONS                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  friendRequests                     one record per request lifecycle    │
//! │  users/<uid>/friends                one edge per friend, mirrored on    │
//! │                                     both sides, never one-sided         │
//! │  users/<uid>/blocks                 current block state per target      │
//! │  users/<uid>/blocks/<t>/events      append-only block/unblock audit     │
//! │  friendCooldowns                    decline suppressions per ordered    │
//! │                                     (requester, target) pair            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod blocks;
mod cooldown;
mod edges;
mod listing;
mod presence;
mod requests;
mod service;

pub use blocks::{BlockEvent, BlockEventType, BlockRecord, BlockRegistry};
pub use cooldown::{CooldownGuard, CooldownRecord};
pub use edges::{EdgeStore, FriendEdge};
pub use listing::{merge_dedupe, FriendListPager, FriendsPage};
pub use presence::{merge_with_presence, FriendView, PresenceStatus};
pub use requests::{FriendRequest, RequestFeed, RequestLedger, RequestStatus};
pub use service::FriendsService;

// ============================================================================
// COLLECTION PATHS
// ============================================================================

/// Request lifecycle records, one per request
pub(crate) const FRIEND_REQUESTS: &str = "friendRequests";

/// Re-request suppressions, keyed by ordered (requester, target) pair
pub(crate) const FRIEND_COOLDOWNS: &str = "friendCooldowns";

/// A user's friendship edges, keyed by the friend's uid
pub(crate) fn friends_of(uid: &str) -> String {
    format!("users/{}/friends", uid)
}

/// A user's block states, keyed by the blocked target's uid
pub(crate) fn blocks_of(uid: &str) -> String {
    format!("users/{}/blocks", uid)
}

/// Append-only audit trail for one (owner, target) block relationship
pub(crate) fn block_events_of(owner: &str, target: &str) -> String {
    format!("users/{}/blocks/{}/events", owner, target)
}

/// Document id for a cooldown on the ordered (requester, target) pair
pub(crate) fn cooldown_id(requester: &str, target: &str) -> String {
    format!("{}__{}", requester, target)
}
