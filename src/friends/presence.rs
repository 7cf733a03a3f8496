//! Presence enrichment for friend listings.
//!
//! Presence is ephemeral and never persisted here. The service keeps the
//! latest batch from its presence source in memory and lays it over the
//! stored edges on read. A friend missing from the batch renders offline
//! while keeping the last-seen timestamps already on the view.

use serde::{Deserialize, Serialize};

use super::edges::FriendEdge;

// ============================================================================
// TYPES
// ============================================================================

/// One user's presence as reported by the presence source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStatus {
    /// Whose presence this is
    pub uid: String,
    /// Whether the user is connected right now
    pub is_online: bool,
    /// Latest activity of any kind (epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
    /// When the user last came online (epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_online_at: Option<i64>,
    /// When the user last went offline (epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_offline_at: Option<i64>,
}

/// A friendship edge with presence laid over it, ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendView {
    /// Uid of the friend
    pub friend_uid: String,
    /// When the friendship was accepted (epoch millis)
    pub since: i64,
    /// Last interaction across the edge (epoch millis)
    pub last_interaction_at: i64,
    /// Whether the friend is online per the latest presence batch
    pub is_online: bool,
    /// Latest activity of any kind (epoch millis)
    pub last_seen: Option<i64>,
    /// When the friend last came online (epoch millis)
    pub last_online_at: Option<i64>,
    /// When the friend last went offline (epoch millis)
    pub last_offline_at: Option<i64>,
}

impl FriendView {
    /// View of an edge before any presence is known
    pub fn offline(edge: &FriendEdge) -> Self {
        Self {
            friend_uid: edge.friend_uid.clone(),
            since: edge.since,
            last_interaction_at: edge.last_interaction_at,
            is_online: false,
            last_seen: None,
            last_online_at: None,
            last_offline_at: None,
        }
    }
}

// ============================================================================
// MERGE
// ============================================================================

/// Lay a presence batch over friend views, preserving list order.
///
/// Views with a matching status take its fields wholesale. Views without
/// one render offline but keep any last-seen data they already carry.
pub fn merge_with_presence(views: Vec<FriendView>, statuses: &[PresenceStatus]) -> Vec<FriendView> {
    views
        .into_iter()
        .map(|mut view| {
            match statuses.iter().find(|s| s.uid == view.friend_uid) {
                Some(status) => {
                    view.is_online = status.is_online;
                    view.last_seen = status.last_seen.or(view.last_seen);
                    view.last_online_at = status.last_online_at.or(view.last_online_at);
                    view.last_offline_at = status.last_offline_at.or(view.last_offline_at);
                }
                None => {
                    view.is_online = false;
                }
            }
            view
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn view(uid: &str) -> FriendView {
        FriendView::offline(&FriendEdge {
            friend_uid: uid.to_string(),
            since: 100,
            last_interaction_at: 200,
        })
    }

    fn online(uid: &str) -> PresenceStatus {
        PresenceStatus {
            uid: uid.to_string(),
            is_online: true,
            last_seen: Some(5000),
            last_online_at: Some(5000),
            last_offline_at: None,
        }
    }

    #[test]
    fn test_matching_status_marks_online() {
        let merged = merge_with_presence(vec![view("a"), view("b")], &[online("a")]);

        assert!(merged[0].is_online);
        assert_eq!(merged[0].last_seen, Some(5000));
        assert!(!merged[1].is_online);
        assert!(merged[1].last_seen.is_none());
    }

    #[test]
    fn test_missing_status_preserves_last_seen() {
        let mut seen_before = view("a");
        seen_before.is_online = true;
        seen_before.last_seen = Some(4000);

        let merged = merge_with_presence(vec![seen_before], &[]);
        assert!(!merged[0].is_online);
        assert_eq!(merged[0].last_seen, Some(4000));
    }

    #[test]
    fn test_offline_status_with_last_seen_applies() {
        let status = PresenceStatus {
            uid: "a".to_string(),
            is_online: false,
            last_seen: Some(7000),
            last_online_at: Some(6000),
            last_offline_at: Some(7000),
        };

        let merged = merge_with_presence(vec![view("a")], &[status]);
        assert!(!merged[0].is_online);
        assert_eq!(merged[0].last_seen, Some(7000));
        assert_eq!(merged[0].last_offline_at, Some(7000));
    }

    #[test]
    fn test_merge_preserves_list_order() {
        let merged = merge_with_presence(
            vec![view("c"), view("a"), view("b")],
            &[online("a"), online("b")],
        );
        let uids: Vec<_> = merged.iter().map(|v| v.friend_uid.as_str()).collect();
        assert_eq!(uids, ["c", "a", "b"]);
    }

    #[test]
    fn test_view_carries_edge_fields() {
        let v = view("a");
        assert_eq!(v.since, 100);
        assert_eq!(v.last_interaction_at, 200);
        assert!(!v.is_online);
    }
}
