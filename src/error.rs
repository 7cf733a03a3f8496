//! # Error Handling
//!
//! This module provides the error types for Kith Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                      │
//! │  │                                                                      │
//! │  ├── Session Errors                                                     │
//! │  │   └── NoIdentity            - No signed-in user bound                │
//! │  │                                                                      │
//! │  ├── Graph Errors (expected outcomes, surfaced to the user)             │
//! │  │   ├── CannotRequestSelf     - Request targets the requester          │
//! │  │   ├── AlreadyFriends        - Friendship edge already exists         │
//! │  │   ├── NotFriends            - No friendship edge exists              │
//! │  │   ├── RequestPending        - A pending request already exists       │
//! │  │   ├── RequestNotPending     - Request already resolved               │
//! │  │   ├── RequestNotFound       - No such friend request                 │
//! │  │   ├── BlockedByMe           - Requester has blocked the target       │
//! │  │   ├── BlockedByTarget       - Target has blocked the requester       │
//! │  │   └── CooldownActive        - Recent decline suppresses re-requests  │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                     │
//! │  │   ├── DatabaseError         - SQLite-level failure                   │
//! │  │   ├── SerializationError    - Record could not be encoded            │
//! │  │   ├── DeserializationError  - Stored document could not be decoded   │
//! │  │   └── TransactionConflict   - Atomic commit lost its retry budget    │
//! │  │                                                                      │
//! │  └── Operation Errors                                                   │
//! │      └── Timeout               - Store round-trip deadline exceeded     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Graph errors are ordinary outcomes of the relationship rules, not
//! failures: they are never retried, never reported to failure sinks, and
//! their display strings are written to be shown to the user as-is.
//! Storage and operation errors are infrastructure faults; callers may
//! retry the recoverable ones and should report the rest.

use thiserror::Error;

/// Result type alias for Kith Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Kith Core
///
/// All errors are categorized by module/domain to make error handling
/// clearer and to provide meaningful error messages to users.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Session Errors (100-199)
    // ========================================================================

    /// No signed-in user is bound to the service
    #[error("No signed-in user. Sign in before managing friends.")]
    NoIdentity,

    // ========================================================================
    // Graph Errors (200-299)
    // ========================================================================

    /// Cannot send a friend request to yourself
    #[error("You cannot send a friend request to yourself.")]
    CannotRequestSelf,

    /// Already friends with this user
    #[error("You are already friends with this user.")]
    AlreadyFriends,

    /// Not friends with this user
    #[error("You are not friends with this user.")]
    NotFriends,

    /// A friend request between this pair is already pending
    #[error("A friend request to this user is already pending.")]
    RequestPending,

    /// The friend request has already been resolved
    #[error("This friend request has already been resolved.")]
    RequestNotPending,

    /// Friend request not found
    #[error("Friend request not found.")]
    RequestNotFound,

    /// The requester has blocked the target
    #[error("You have blocked this user. Unblock them to send a friend request.")]
    BlockedByMe,

    /// The target has blocked the requester
    #[error("You cannot send a friend request to this user.")]
    BlockedByTarget,

    /// A recent decline put this pair on cooldown
    #[error("A friend request to this user was declined recently. Try again later.")]
    CooldownActive {
        /// Epoch milliseconds at which the suppression ends
        until: i64,
    },

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An atomic transaction kept losing commit races
    #[error("Storage transaction conflict: {0}")]
    TransactionConflict(String),

    // ========================================================================
    // Operation Errors (500-599)
    // ========================================================================

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Session
    /// - 200-299: Graph
    /// - 400-499: Storage
    /// - 500-599: Operations
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Session (100-199)
            Error::NoIdentity => 100,

            // Graph (200-299)
            Error::CannotRequestSelf => 200,
            Error::AlreadyFriends => 201,
            Error::NotFriends => 202,
            Error::RequestPending => 203,
            Error::RequestNotPending => 204,
            Error::RequestNotFound => 205,
            Error::BlockedByMe => 206,
            Error::BlockedByTarget => 207,
            Error::CooldownActive { .. } => 208,

            // Storage (400-499)
            Error::DatabaseError(_) => 400,
            Error::SerializationError(_) => 401,
            Error::DeserializationError(_) => 402,
            Error::TransactionConflict(_) => 403,

            // Operations (500-599)
            Error::Timeout(_) => 500,

            // Internal (900-999)
            Error::Internal(_) => 900,
        }
    }

    /// Check if this error is an expected graph outcome
    ///
    /// Graph outcomes are answers, not faults: they must be shown to the
    /// user (the display string is the message) and must never be retried
    /// or routed to a failure reporter.
    pub fn is_graph_outcome(&self) -> bool {
        matches!(
            self,
            Error::CannotRequestSelf
                | Error::AlreadyFriends
                | Error::NotFriends
                | Error::RequestPending
                | Error::RequestNotPending
                | Error::RequestNotFound
                | Error::BlockedByMe
                | Error::BlockedByTarget
                | Error::CooldownActive { .. }
        )
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can potentially be resolved by retrying
    /// the same operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::TransactionConflict(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout("store operation deadline exceeded".into())
    }
}

// ============================================================================
// TESTS
// ============================================================================
