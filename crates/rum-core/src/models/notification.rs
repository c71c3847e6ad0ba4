//! Notification model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ObjectType, TrxId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Dislike,
    Comment,
    Reply,
}

impl NotificationKind {
    pub const ALL: [Self; 4] = [Self::Like, Self::Dislike, Self::Comment, Self::Reply];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Comment => "comment",
            Self::Reply => "reply",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "comment" => Ok(Self::Comment),
            "reply" => Ok(Self::Reply),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// Something another publisher did to the local user's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub group_id: String,
    /// The local user's post or comment that was acted on
    pub object_id: TrxId,
    pub object_type: ObjectType,
    /// The trx that caused the notification
    pub from_trx_id: TrxId,
    pub from_publisher: String,
    pub kind: NotificationKind,
    pub unread: bool,
    pub timestamp: i64,
}

/// Notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub group_id: String,
    pub object_id: TrxId,
    pub object_type: ObjectType,
    pub from_trx_id: TrxId,
    pub from_publisher: String,
    pub kind: NotificationKind,
    pub timestamp: i64,
}
