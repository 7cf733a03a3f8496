//! Collaborator seams.
//!
//! The friends service does not own sign-in, presence transport, or UI
//! surfaces. It talks to them through these traits so hosts can plug in
//! whatever they have, and so tests can script them.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      COLLABORATOR SEAMS                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  IdentityProvider ──► who is signed in, pushed on every change   │
//! │  PresenceSource   ──► live batches of friend presence            │
//! │  Notifier         ──► user-facing toasts for operation outcomes  │
//! │  FailureReporter  ──► infrastructure failures, for telemetry     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::{Error, Result};
use crate::friends::PresenceStatus;

/// Stream of the signed-in uid, `None` while signed out
pub type IdentityStream = BoxStream<'static, Option<String>>;

/// Stream of presence batches
pub type PresenceStream = BoxStream<'static, Vec<PresenceStatus>>;

// ============================================================================
// TRAITS
// ============================================================================

/// Source of the signed-in identity.
///
/// The stream yields the current uid immediately, then again on every
/// sign-in or sign-out. The service follows it for as long as it runs.
pub trait IdentityProvider: Send + Sync {
    /// Open the identity feed
    fn identity_stream(&self) -> IdentityStream;
}

/// Source of live presence for the signed-in user's circle
#[async_trait]
pub trait PresenceSource: Send + Sync {
    /// Open the presence feed. Each item replaces the previous batch.
    async fn presence_stream(&self) -> Result<PresenceStream>;
}

/// Sink for user-facing operation outcomes
pub trait Notifier: Send + Sync {
    /// An operation completed
    fn success(&self, message: &str);
    /// Something changed that the user should know about
    fn info(&self, message: &str);
    /// An operation failed for reasons the user cannot fix
    fn error(&self, message: &str);
}

/// Sink for infrastructure failures.
///
/// Domain outcomes such as "already friends" never land here, only
/// failures worth paging over.
pub trait FailureReporter: Send + Sync {
    /// Record one failure with the operation it interrupted
    fn report(&self, context: &str, error: &Error);
}

// ============================================================================
// DEFAULT IMPLEMENTATIONS
// ============================================================================

/// Identity fixed for the process lifetime, useful for tools and tests
pub struct StaticIdentity(pub Option<String>);

impl IdentityProvider for StaticIdentity {
    fn identity_stream(&self) -> IdentityStream {
        futures::stream::iter([self.0.clone()]).boxed()
    }
}

/// Presence source that reports nobody online
pub struct NullPresence;

#[async_trait]
impl PresenceSource for NullPresence {
    async fn presence_stream(&self) -> Result<PresenceStream> {
        Ok(futures::stream::empty().boxed())
    }
}

/// Notifier that drops every message
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn success(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Reporter that writes failures to the log
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, context: &str, error: &Error) {
        tracing::error!("{} failed: {}", context, error);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_identity_yields_once() {
        let provider = StaticIdentity(Some("alice".to_string()));
        let mut stream = provider.identity_stream();

        assert_eq!(stream.next().await, Some(Some("alice".to_string())));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_null_presence_stream_is_empty() {
        let mut stream = NullPresence.presence_stream().await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_log_reporter_accepts_any_error() {
        LogReporter.report("test op", &Error::TransactionConflict("busy".into()));
        NullNotifier.success("unheard");
    }
}
