//! Remote node API.
//!
//! The node is an external process that owns networking and consensus. The
//! sync layer only needs to read content after a cursor, submit new
//! activities, inspect the delivery queue and read group metadata.

mod client;
mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Cursor, Group, Producer, PubQueueItem, Transfer, TrxId};

pub use client::HttpNodeClient;
pub use types::NodeContent;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid node configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Node HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Node API error: {0}")]
    Api(String),
    #[error("Invalid node payload: {0}")]
    InvalidPayload(String),
}

pub type NodeResult<T> = Result<T, NodeError>;

/// Operations the sync layer performs against the node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Groups the node has joined
    async fn list_groups(&self) -> NodeResult<Vec<Group>>;

    /// Up to `limit` content items of `group_id` strictly after `cursor`,
    /// oldest first
    async fn fetch_contents(
        &self,
        group_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> NodeResult<Vec<NodeContent>>;

    /// Submit an activity, returning the trx id the node assigned
    async fn submit(&self, group_id: &str, activity: &serde_json::Value) -> NodeResult<TrxId>;

    /// Delivery state of this node's own recent submissions
    async fn pub_queue(&self, group_id: &str) -> NodeResult<Vec<PubQueueItem>>;

    /// Remove entries from the pub queue, returning the ids the node dropped
    async fn ack(&self, trx_ids: &[TrxId]) -> NodeResult<Vec<TrxId>>;

    /// Approved producers of a group
    async fn producers(&self, group_id: &str) -> NodeResult<Vec<Producer>>;

    /// Tips recorded for a group from `cursor.timestamp` on, resuming after
    /// the transfer id in `cursor.trx_id` when one is set
    async fn transfers(
        &self,
        group_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> NodeResult<Vec<Transfer>>;
}
