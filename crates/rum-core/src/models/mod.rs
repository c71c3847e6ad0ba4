//! Data models for rum-sync

mod comment;
mod counter;
mod notification;
mod post;
mod profile;
mod relation;
mod status;
mod sync_state;
mod trx;

pub use comment::Comment;
pub use counter::{Counter, CounterKind, ObjectType, Reaction};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use post::{hot_count, Image, Post, Summary, SummaryDelta};
pub use profile::Profile;
pub use relation::{Relation, RelationKind};
pub use status::ContentStatus;
pub use sync_state::{
    Category, Cursor, Group, GroupSyncState, LatestStatus, Producer, PubQueueItem, PubQueueState,
    Transfer,
};
pub use trx::TrxId;
