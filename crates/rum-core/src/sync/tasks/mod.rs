//! The polling categories

mod content;
mod group_meta;
mod pub_queue;

pub use content::{ContentItem, ContentTask};
pub use group_meta::{GroupsTask, ProducersTask, TransfersTask};
pub use pub_queue::PubQueueTask;
