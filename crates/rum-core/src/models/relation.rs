//! Relation (follow/block) model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ContentStatus, TrxId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Follow,
    Unfollow,
    Block,
    Unblock,
}

impl RelationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Unfollow => "unfollow",
            Self::Block => "block",
            Self::Unblock => "unblock",
        }
    }

    /// Follow/unfollow and block/unblock are tracked as separate entities.
    #[must_use]
    pub const fn family(self) -> &'static str {
        match self {
            Self::Follow | Self::Unfollow => "follow",
            Self::Block | Self::Unblock => "block",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(Self::Follow),
            "unfollow" => Ok(Self::Unfollow),
            "block" => Ok(Self::Block),
            "unblock" => Ok(Self::Unblock),
            other => Err(format!("unknown relation kind: {other}")),
        }
    }
}

/// Directed relation from `publisher` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub trx_id: TrxId,
    pub group_id: String,
    pub publisher: String,
    pub target: String,
    pub kind: RelationKind,
    pub timestamp: i64,
    pub status: ContentStatus,
}
