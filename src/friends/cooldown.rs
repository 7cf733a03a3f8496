//! Re-request cooldown suppressions.
//!
//! When a decline asks for breathing room, a cooldown record is written for
//! the ordered (requester, target) pair. While `until` lies in the future,
//! new requests along that exact direction are refused. The reverse
//! direction is unaffected, and expired records simply stop matching; they
//! are overwritten by the next decline rather than swept.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{Atomic, Database};
use crate::time::now_timestamp_millis;

// ============================================================================
// TYPES
// ============================================================================

/// An active or expired re-request suppression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownRecord {
    /// Who is being held back from re-requesting
    pub requester_uid: String,
    /// Who they would be requesting
    pub target_uid: String,
    /// Requests are refused until this instant (epoch millis)
    pub until: i64,
    /// Same instant, kept for retention tooling
    pub expires_at: i64,
}

// ============================================================================
// COOLDOWN GUARD
// ============================================================================

/// Reads and writes cooldown records for ordered requester/target pairs
pub struct CooldownGuard {
    db: Arc<Database>,
}

impl CooldownGuard {
    /// Build a guard over an open database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch the cooldown for the ordered pair, expired or not
    pub async fn read_cooldown(
        &self,
        requester: &str,
        target: &str,
    ) -> Result<Option<CooldownRecord>> {
        let doc = self
            .db
            .get_document(super::FRIEND_COOLDOWNS, &super::cooldown_id(requester, target))
            .await?;
        doc.map(|d| d.decode()).transpose()
    }

    /// Write (or overwrite) the pair's cooldown, suppressing until `until`
    pub async fn set_cooldown(
        &self,
        requester: &str,
        target: &str,
        until: i64,
    ) -> Result<CooldownRecord> {
        let record = Self::record(requester, target, until);
        self.db
            .put_document(
                super::FRIEND_COOLDOWNS,
                &super::cooldown_id(requester, target),
                &serde_json::to_value(&record)?,
            )
            .await?;
        Ok(record)
    }

    /// True while the pair's cooldown lies in the future
    pub async fn is_active(&self, requester: &str, target: &str) -> Result<bool> {
        let record = self.read_cooldown(requester, target).await?;
        Ok(Self::active(record.as_ref()))
    }

    // ===== TRANSACTION HELPERS =====

    pub(crate) fn read_in(
        tx: &Atomic<'_>,
        requester: &str,
        target: &str,
    ) -> Result<Option<CooldownRecord>> {
        let doc = tx.read(super::FRIEND_COOLDOWNS, &super::cooldown_id(requester, target))?;
        doc.map(|d| d.decode()).transpose()
    }

    pub(crate) fn write_in(
        tx: &mut Atomic<'_>,
        requester: &str,
        target: &str,
        until: i64,
    ) -> Result<()> {
        let record = Self::record(requester, target, until);
        tx.write(
            super::FRIEND_COOLDOWNS,
            &super::cooldown_id(requester, target),
            &serde_json::to_value(&record)?,
        )
    }

    fn record(requester: &str, target: &str, until: i64) -> CooldownRecord {
        CooldownRecord {
            requester_uid: requester.to_string(),
            target_uid: target.to_string(),
            until,
            expires_at: until,
        }
    }

    fn active(record: Option<&CooldownRecord>) -> bool {
        match record {
            Some(record) => now_timestamp_millis() < record.until,
            None => false,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use crate::time::millis_after;
    use std::time::Duration;

    async fn guard() -> CooldownGuard {
        let db = Arc::new(Database::open(None).await.unwrap());
        CooldownGuard::new(db)
    }

    #[tokio::test]
    async fn test_future_cooldown_is_active() {
        let guard = guard().await;
        let until = millis_after(Duration::from_secs(3600));
        guard.set_cooldown("alice", "bob", until).await.unwrap();

        assert!(guard.is_active("alice", "bob").await.unwrap());
        let record = guard.read_cooldown("alice", "bob").await.unwrap().unwrap();
        assert_eq!(record.until, until);
        assert_eq!(record.expires_at, until);
    }

    #[tokio::test]
    async fn test_expired_cooldown_is_inactive_but_kept() {
        let guard = guard().await;
        guard
            .set_cooldown("alice", "bob", now_timestamp_millis() - 1)
            .await
            .unwrap();

        assert!(!guard.is_active("alice", "bob").await.unwrap());
        assert!(guard.read_cooldown("alice", "bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cooldown_is_directional() {
        let guard = guard().await;
        let until = millis_after(Duration::from_secs(3600));
        guard.set_cooldown("alice", "bob", until).await.unwrap();

        assert!(guard.is_active("alice", "bob").await.unwrap());
        assert!(!guard.is_active("bob", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_extends_window() {
        let guard = guard().await;
        guard
            .set_cooldown("alice", "bob", now_timestamp_millis() - 1)
            .await
            .unwrap();
        assert!(!guard.is_active("alice", "bob").await.unwrap());

        let later = millis_after(Duration::from_secs(60));
        guard.set_cooldown("alice", "bob", later).await.unwrap();
        assert!(guard.is_active("alice", "bob").await.unwrap());
        assert_eq!(
            guard.read_cooldown("alice", "bob").await.unwrap().unwrap().until,
            later
        );
    }
}
