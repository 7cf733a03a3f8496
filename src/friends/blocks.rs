//! Block registry with append-only audit trail.
//!
//! Blocking is strictly directional: `users/a/blocks/b` says nothing about
//! whether `b` blocks `a`. Each block relationship keeps two kinds of data,
//! a single current-state document and an append-only event trail under
//! `users/a/blocks/b/events`. The state document is authoritative; if an
//! event append fails after the state was saved, the failure is logged and
//! the operation still succeeds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{Atomic, Database, Query, SortDirection};
use crate::time::now_timestamp_millis;

// ============================================================================
// TYPES
// ============================================================================

/// Current block state for one (owner, target) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    /// Uid of the blocked (or previously blocked) target
    pub uid: String,
    /// Whether the block is currently in force
    pub is_blocked: bool,
    /// When the current block began (epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<i64>,
    /// When the last unblock happened (epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unblocked_at: Option<i64>,
    /// Free-form reason supplied with the block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Who performed the latest transition
    pub actor_uid: String,
    /// When the state document last changed (epoch millis)
    pub updated_at: i64,
}

/// Kind of audit transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockEventType {
    /// The block came into force
    Block,
    /// The block was lifted
    Unblock,
}

/// One entry in the append-only block audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEvent {
    /// Stable event id
    pub id: String,
    /// Which transition this entry records
    #[serde(rename = "type")]
    pub event_type: BlockEventType,
    /// Uid the transition applies to
    pub target_uid: String,
    /// Free-form reason, carried on block events only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Who performed the transition
    pub actor_uid: String,
    /// When it happened (epoch millis)
    pub created_at: i64,
}

// ============================================================================
// BLOCK REGISTRY
// ============================================================================

/// Manages directional block state and its audit trail
pub struct BlockRegistry {
    db: Arc<Database>,
}

impl BlockRegistry {
    /// Build a registry over an open database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Block `target` on behalf of `owner`.
    ///
    /// Re-blocking an already blocked target refreshes the state document
    /// but appends no second audit event.
    pub async fn block_user(
        &self,
        owner: &str,
        target: &str,
        reason: Option<String>,
    ) -> Result<BlockRecord> {
        let collection = super::blocks_of(owner);
        let previous = self.read_state(&collection, target).await?;
        let already_blocked = previous.as_ref().map(|r| r.is_blocked).unwrap_or(false);

        let now = now_timestamp_millis();
        let record = BlockRecord {
            uid: target.to_string(),
            is_blocked: true,
            // A redundant block keeps the original start of the window.
            blocked_at: match &previous {
                Some(prev) if already_blocked => prev.blocked_at,
                _ => Some(now),
            },
            unblocked_at: None,
            reason: reason.clone(),
            actor_uid: owner.to_string(),
            updated_at: now,
        };
        self.db
            .put_document(&collection, target, &serde_json::to_value(&record)?)
            .await?;

        if !already_blocked {
            self.append_event(owner, target, BlockEventType::Block, reason).await;
        }
        tracing::info!("User {} blocked {}", owner, target);
        Ok(record)
    }

    /// Lift `owner`'s block on `target`. Returns whether a block was in force;
    /// unblocking an unblocked target is a no-op and appends no event.
    pub async fn unblock_user(&self, owner: &str, target: &str) -> Result<bool> {
        let collection = super::blocks_of(owner);
        let previous = match self.read_state(&collection, target).await? {
            Some(record) if record.is_blocked => record,
            _ => return Ok(false),
        };

        let now = now_timestamp_millis();
        let record = BlockRecord {
            uid: target.to_string(),
            is_blocked: false,
            blocked_at: previous.blocked_at,
            unblocked_at: Some(now),
            reason: None,
            actor_uid: owner.to_string(),
            updated_at: now,
        };
        self.db
            .put_document(&collection, target, &serde_json::to_value(&record)?)
            .await?;

        self.append_event(owner, target, BlockEventType::Unblock, None).await;
        tracing::info!("User {} unblocked {}", owner, target);
        Ok(true)
    }

    /// True when `owner` currently blocks `target`
    pub async fn is_blocked(&self, owner: &str, target: &str) -> Result<bool> {
        let record = self.read_state(&super::blocks_of(owner), target).await?;
        Ok(record.map(|r| r.is_blocked).unwrap_or(false))
    }

    /// Everyone `owner` currently blocks, most recently blocked first
    pub async fn list_blocked(&self, owner: &str) -> Result<Vec<BlockRecord>> {
        let query = Query::collection(super::blocks_of(owner))
            .where_eq("isBlocked", true)
            .order_by("blockedAt", SortDirection::Descending);
        let docs = self.db.run_query(&query).await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    /// Full audit trail for the (owner, target) pair, oldest first
    pub async fn block_history(&self, owner: &str, target: &str) -> Result<Vec<BlockEvent>> {
        let query = Query::collection(super::block_events_of(owner, target))
            .order_by("createdAt", SortDirection::Ascending);
        let docs = self.db.run_query(&query).await?;
        docs.iter().map(|d| d.decode()).collect()
    }

    // ===== TRANSACTION HELPERS =====

    /// True when `owner` blocks `target`, read inside an open transaction
    pub(crate) fn is_blocked_in(tx: &Atomic<'_>, owner: &str, target: &str) -> Result<bool> {
        let doc = tx.read(&super::blocks_of(owner), target)?;
        let record: Option<BlockRecord> = doc.map(|d| d.decode()).transpose()?;
        Ok(record.map(|r| r.is_blocked).unwrap_or(false))
    }

    // ===== INTERNAL =====

    async fn read_state(&self, collection: &str, target: &str) -> Result<Option<BlockRecord>> {
        let doc = self.db.get_document(collection, target).await?;
        doc.map(|d| d.decode()).transpose()
    }

    /// Append one audit event. The state document has already been saved,
    /// so failures here are logged rather than surfaced.
    async fn append_event(
        &self,
        owner: &str,
        target: &str,
        event_type: BlockEventType,
        reason: Option<String>,
    ) {
        let event = BlockEvent {
            id: Uuid::new_v4().to_string(),
            event_type,
            target_uid: target.to_string(),
            reason,
            actor_uid: owner.to_string(),
            created_at: now_timestamp_millis(),
        };
        let collection = super::block_events_of(owner, target);
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Block state saved but audit event could not be encoded: {}", e);
                return;
            }
        };
        if let Err(e) = self.db.put_document(&collection, &event.id, &payload).await {
            tracing::warn!(
                "Block state for {} saved but audit event write failed: {}",
                target,
                e
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
