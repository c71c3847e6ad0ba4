//! Comment model

use serde::{Deserialize, Serialize};

use super::{ContentStatus, Image, Summary, TrxId};

/// A comment on a post, or a reply to another comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub trx_id: TrxId,
    pub group_id: String,
    /// The post this comment belongs to
    pub object_id: TrxId,
    /// The comment this one replies to, if any
    pub reply_to: Option<TrxId>,
    pub publisher: String,
    pub timestamp: i64,
    pub content: String,
    pub images: Vec<Image>,
    pub status: ContentStatus,
    /// `comment_count` counts direct replies
    pub summary: Summary,
}
