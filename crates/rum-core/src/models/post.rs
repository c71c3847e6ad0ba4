//! Post model

use serde::{Deserialize, Serialize};

use super::{ContentStatus, TrxId};

/// Image attached to a post, comment or profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// MIME type, always `image/*`
    pub media_type: String,
    /// Base64 encoded body as delivered by the node
    pub content: String,
}

/// Derived aggregate counts maintained incrementally by the merge handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub like_count: i64,
    pub dislike_count: i64,
    pub comment_count: i64,
    pub hot_count: i64,
    pub transfer_count: i64,
}

impl Summary {
    /// Apply a like/dislike/comment delta, clamping every count at zero and
    /// recomputing the hot score.
    pub fn apply(&mut self, delta: SummaryDelta) {
        self.like_count = (self.like_count + delta.like).max(0);
        self.dislike_count = (self.dislike_count + delta.dislike).max(0);
        self.comment_count = (self.comment_count + delta.comment).max(0);
        self.transfer_count = (self.transfer_count + delta.transfer).max(0);
        self.hot_count = hot_count(self.like_count, self.dislike_count, self.comment_count);
    }
}

/// A change to apply to a [`Summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryDelta {
    pub like: i64,
    pub dislike: i64,
    pub comment: i64,
    pub transfer: i64,
}

impl SummaryDelta {
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.like == 0 && self.dislike == 0 && self.comment == 0 && self.transfer == 0
    }
}

/// Popularity score derived from the reaction counts.
#[must_use]
pub fn hot_count(like: i64, dislike: i64, comment: i64) -> i64 {
    (like * 2 + comment - dislike * 2).max(0)
}

/// A top-level post in a group timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub trx_id: TrxId,
    pub group_id: String,
    pub publisher: String,
    /// Logical timestamp assigned by the node
    pub timestamp: i64,
    /// Optional title
    pub name: Option<String>,
    pub content: String,
    pub images: Vec<Image>,
    pub status: ContentStatus,
    pub deleted: bool,
    pub summary: Summary,
}

impl Post {
    /// First line of the content, truncated to `max_len` characters
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.content.lines().next().unwrap_or(""))
            .chars()
            .take(max_len)
            .collect()
    }
}
