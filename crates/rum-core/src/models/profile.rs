//! Profile model

use serde::{Deserialize, Serialize};

use super::{ContentStatus, Image, TrxId};

/// A publisher's profile in one group. Newer profiles replace older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub trx_id: TrxId,
    pub group_id: String,
    pub publisher: String,
    pub timestamp: i64,
    pub name: String,
    pub avatar: Option<Image>,
    pub wallet: Option<String>,
    pub status: ContentStatus,
}
