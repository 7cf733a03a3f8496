//! # Kith Core
//!
//! A social graph engine: friend requests, mirrored friendship edges,
//! blocking with an audit trail, re-request cooldowns, and cursor-paginated
//! friend listings enriched with live presence.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KITH CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                       FriendsService                             │   │
//! │  │   identity-scoped operations, toasts, degradation, timeouts     │   │
//! │  └──────┬──────────┬──────────┬──────────┬──────────┬──────────────┘   │
//! │         │          │          │          │          │                  │
//! │  ┌──────▼───┐ ┌────▼─────┐ ┌──▼───────┐ ┌▼────────┐ ┌▼─────────────┐   │
//! │  │ Request  │ │  Edge    │ │  Block   │ │Cooldown │ │ FriendList   │   │
//! │  │ Ledger   │ │  Store   │ │ Registry │ │ Guard   │ │ Pager        │   │
//! │  │          │ │          │ │          │ │         │ │              │   │
//! │  │ - send   │ │ - mirror │ │ - state  │ │ - set   │ │ - pages      │   │
//! │  │ - accept │ │ - touch  │ │ - events │ │ - check │ │ - cursor     │   │
//! │  │ - watch  │ │ - remove │ │ - history│ │         │ │ - merge      │   │
//! │  └──────┬───┘ └────┬─────┘ └──┬───────┘ └┬────────┘ └┬─────────────┘   │
//! │         │          │          │          │           │                 │
//! │         └──────────┴──────────┴──────────┴───────────┘                 │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼────────────────────────────────────┐   │
//! │  │                          Storage                                 │   │
//! │  │   SQLite document store: collections, queries, transactions,    │   │
//! │  │   query watchers                                                │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`storage`] - Document store (SQLite, queries, transactions, watchers)
//! - [`friends`] - The social graph (requests, edges, blocks, cooldowns, listing)
//! - [`collab`] - Seams to the host: identity, presence, notifications
//! - [`time`] - Timestamp helpers
//!
//! ## Consistency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CONSISTENCY GUARANTEES                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Mirrored friendship edges                                              │
//! │  ─────────────────────────                                              │
//! │  users/a/friends/b and users/b/friends/a are written and removed in    │
//! │  one transaction with identical timestamps. No reader can observe a    │
//! │  one-sided friendship.                                                 │
//! │                                                                         │
//! │  Single-winner request resolution                                       │
//! │  ────────────────────────────────                                       │
//! │  Accept, decline, and cancel re-read the request inside their          │
//! │  transaction and require it to still be pending. Of two racing         │
//! │  accepts, exactly one succeeds.                                        │
//! │                                                                         │
//! │  Authoritative block state                                              │
//! │  ─────────────────────────                                              │
//! │  The per-target state document decides whether a block is in force.   │
//! │  The audit trail is best-effort and never gates the block itself.      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod collab;
pub mod error;
pub mod friends;
pub mod storage;
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use error::{Error, Result};
pub use friends::{
    BlockRecord, FriendEdge, FriendRequest, FriendView, FriendsPage, FriendsService,
    PresenceStatus, RequestStatus,
};
pub use storage::{Database, StorageConfig};

// ============================================================================
// CONFIGURATION
// ============================================================================

use std::time::Duration;

/// Tunables for the social graph engine
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Friends fetched per page
    pub page_size: usize,
    /// How long a pending request lives before the sweep expires it
    pub request_ttl: Duration,
    /// Suppression window written by a decline-with-cooldown
    pub decline_cooldown: Duration,
    /// Upper bound for any single store operation
    pub op_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            request_ttl: Duration::from_secs(60 * 60 * 24 * 30),
            decline_cooldown: Duration::from_secs(60 * 60 * 24),
            op_timeout: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Kith Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
