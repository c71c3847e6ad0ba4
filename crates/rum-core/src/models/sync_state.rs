//! Sync bookkeeping models: cursors, unread status, groups, producers,
//! transfers and pub queue entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TrxId;

/// Polling category. Each category keeps its own cursor per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Content,
    PubQueue,
    Producers,
    Transfers,
    Groups,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::PubQueue => "pub_queue",
            Self::Producers => "producers",
            Self::Transfers => "transfers",
            Self::Groups => "groups",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last processed position for one (group, category).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub timestamp: i64,
    pub trx_id: Option<TrxId>,
}

impl Cursor {
    #[must_use]
    pub const fn is_start(&self) -> bool {
        self.timestamp == 0 && self.trx_id.is_none()
    }

    /// Resume after `trx_id`. The timestamp never moves backwards.
    #[must_use]
    pub fn resumed_after(&self, timestamp: i64, trx_id: TrxId) -> Self {
        Self {
            timestamp: self.timestamp.max(timestamp),
            trx_id: Some(trx_id),
        }
    }
}

/// Per-group unread bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestStatus {
    pub group_id: String,
    pub latest_trx_id: Option<TrxId>,
    pub latest_timestamp: i64,
    /// New posts from other publishers since the group was last read
    pub unread_count: i64,
    pub unread_likes: i64,
    pub unread_dislikes: i64,
    pub unread_comments: i64,
    pub unread_replies: i64,
}

impl LatestStatus {
    #[must_use]
    pub const fn unread_notifications(&self) -> i64 {
        self.unread_likes + self.unread_dislikes + self.unread_comments + self.unread_replies
    }
}

/// Node-reported group state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupSyncState {
    Idle,
    Syncing,
    #[default]
    Synced,
    SyncFailed,
}

impl GroupSyncState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Syncing => "SYNCING",
            Self::Synced => "SYNCED",
            Self::SyncFailed => "SYNC_FAILED",
        }
    }

    /// Whether submissions made now must wait for the node to catch up.
    #[must_use]
    pub const fn is_catching_up(self) -> bool {
        matches!(self, Self::Syncing | Self::SyncFailed)
    }
}

impl FromStr for GroupSyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IDLE" => Ok(Self::Idle),
            "SYNCING" => Ok(Self::Syncing),
            "SYNCED" => Ok(Self::Synced),
            "SYNC_FAILED" => Ok(Self::SyncFailed),
            other => Err(format!("unknown group status: {other}")),
        }
    }
}

/// A group the node has joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: String,
    pub group_name: String,
    /// The local user's publisher key in this group
    pub user_pubkey: String,
    pub owner_pubkey: String,
    pub sync_state: GroupSyncState,
}

/// Block producer approved for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub group_id: String,
    pub producer_pubkey: String,
    pub owner_pubkey: String,
    pub blocks_produced: i64,
}

/// Tip transferred to the author of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub group_id: String,
    pub object_id: TrxId,
    pub sender: String,
    pub recipient: String,
    /// Decimal amount, kept as delivered
    pub amount: String,
    pub asset: String,
    pub timestamp: i64,
}

/// Delivery state reported by the node's pub queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PubQueueState {
    Pending,
    Success,
    Fail,
}

/// One entry from the node's pub queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubQueueItem {
    pub trx_id: TrxId,
    pub group_id: String,
    pub state: PubQueueState,
    pub retry_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_never_moves_backwards() {
        let cursor = Cursor {
            timestamp: 10,
            trx_id: Some(TrxId::new("b")),
        };
        assert_eq!(
            cursor.resumed_after(5, TrxId::new("a")),
            Cursor {
                timestamp: 10,
                trx_id: Some(TrxId::new("a")),
            }
        );
        assert_eq!(cursor.resumed_after(11, TrxId::new("c")).timestamp, 11);
    }

    #[test]
    fn group_state_parse_is_case_insensitive() {
        assert_eq!("syncing".parse(), Ok(GroupSyncState::Syncing));
        assert!(GroupSyncState::Syncing.is_catching_up());
        assert!(!GroupSyncState::Idle.is_catching_up());
    }
}
