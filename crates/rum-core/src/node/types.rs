//! Node wire types and their conversion into local models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NodeError;
use crate::models::{
    Group, GroupSyncState, Producer, PubQueueItem, PubQueueState, Transfer, TrxId,
};

/// Content envelope returned by the node's content endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    #[serde(rename = "TrxId")]
    pub trx_id: TrxId,
    #[serde(rename = "Publisher")]
    pub publisher: String,
    /// Logical timestamp assigned by the node
    #[serde(rename = "TimeStamp")]
    pub timestamp: i64,
    #[serde(rename = "GroupId", default)]
    pub group_id: String,
    /// Activity payload, classified by [`crate::classify::classify`]
    #[serde(rename = "Data")]
    pub data: serde_json::Value,
}

/// Parse a content page item by item.
///
/// An envelope that does not parse keeps its place with null `Data` when its
/// `TrxId` is readable, so the cursor still moves past it. Without a trx id
/// it is dropped.
pub(super) fn parse_content_page(items: Vec<Value>, group_id: &str) -> Vec<NodeContent> {
    items
        .into_iter()
        .filter_map(|item| parse_content(&item, group_id))
        .collect()
}

fn parse_content(item: &Value, group_id: &str) -> Option<NodeContent> {
    let mut content = match NodeContent::deserialize(item) {
        Ok(content) => content,
        Err(error) => {
            let trx_id = item
                .get("TrxId")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|trx_id| !trx_id.is_empty());
            tracing::debug!(?trx_id, %error, "Dropping malformed content envelope");
            NodeContent {
                trx_id: TrxId::new(trx_id?),
                publisher: String::new(),
                timestamp: item
                    .get("TimeStamp")
                    .and_then(Value::as_i64)
                    .unwrap_or_default(),
                group_id: String::new(),
                data: Value::Null,
            }
        }
    };
    if content.group_id.is_empty() {
        content.group_id = group_id.to_string();
    }
    Some(content)
}

#[derive(Debug, Deserialize)]
pub(super) struct GroupsResponse {
    #[serde(default)]
    groups: Option<Vec<Value>>,
}

impl GroupsResponse {
    /// Usable groups; entries that fail to convert are skipped
    pub fn into_groups(self) -> Vec<Group> {
        self.groups
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let group = GroupResponse::deserialize(&entry)
                    .map_err(|error| NodeError::InvalidPayload(error.to_string()))
                    .and_then(Group::try_from);
                match group {
                    Ok(group) => Some(group),
                    Err(error) => {
                        tracing::warn!(%entry, %error, "Skipping group entry");
                        None
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct GroupResponse {
    group_id: String,
    #[serde(default)]
    group_name: String,
    user_pubkey: String,
    #[serde(default)]
    owner_pubkey: String,
    #[serde(default)]
    group_status: Option<String>,
}

impl TryFrom<GroupResponse> for Group {
    type Error = NodeError;

    fn try_from(value: GroupResponse) -> Result<Self, NodeError> {
        if value.group_id.trim().is_empty() || value.user_pubkey.trim().is_empty() {
            return Err(NodeError::InvalidPayload(
                "group entry without group_id/user_pubkey".to_string(),
            ));
        }
        let sync_state = value
            .group_status
            .as_deref()
            .map(str::parse::<GroupSyncState>)
            .transpose()
            .map_err(NodeError::InvalidPayload)?
            .unwrap_or_default();
        Ok(Self {
            group_id: value.group_id,
            group_name: value.group_name,
            user_pubkey: value.user_pubkey,
            owner_pubkey: value.owner_pubkey,
            sync_state,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SubmitRequest<'a> {
    pub data: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubmitResponse {
    #[serde(alias = "TrxId")]
    pub trx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PubQueueResponse {
    #[serde(rename = "GroupId")]
    group_id: String,
    #[serde(rename = "Data", default)]
    data: Option<Vec<PubQueueEntry>>,
}

#[derive(Debug, Deserialize)]
struct PubQueueEntry {
    #[serde(rename = "State")]
    state: PubQueueState,
    #[serde(rename = "RetryCount", default)]
    retry_count: u32,
    #[serde(rename = "Trx")]
    trx: PubQueueTrx,
}

#[derive(Debug, Deserialize)]
struct PubQueueTrx {
    #[serde(rename = "TrxId")]
    trx_id: TrxId,
}

impl PubQueueResponse {
    pub fn into_items(self) -> Vec<PubQueueItem> {
        let group_id = self.group_id;
        self.data
            .unwrap_or_default()
            .into_iter()
            .map(|entry| PubQueueItem {
                trx_id: entry.trx.trx_id,
                group_id: group_id.clone(),
                state: entry.state,
                retry_count: entry.retry_count,
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub(super) struct AckRequest<'a> {
    pub trx_ids: &'a [TrxId],
}

#[derive(Debug, Deserialize)]
pub(super) struct ProducerResponse {
    #[serde(rename = "ProducerPubkey")]
    producer_pubkey: String,
    #[serde(rename = "OwnerPubkey", default)]
    owner_pubkey: String,
    #[serde(rename = "BlocksProduced", default)]
    blocks_produced: i64,
}

impl ProducerResponse {
    pub fn into_producer(self, group_id: &str) -> Producer {
        Producer {
            group_id: group_id.to_string(),
            producer_pubkey: self.producer_pubkey,
            owner_pubkey: self.owner_pubkey,
            blocks_produced: self.blocks_produced,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TransferResponse {
    id: String,
    object_id: TrxId,
    sender: String,
    recipient: String,
    amount: String,
    #[serde(default)]
    asset: String,
    timestamp: i64,
}

impl TransferResponse {
    pub fn into_transfer(self, group_id: &str) -> Transfer {
        Transfer {
            id: self.id,
            group_id: group_id.to_string(),
            object_id: self.object_id,
            sender: self.sender,
            recipient: self.recipient,
            amount: self.amount,
            asset: self.asset,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_content_envelope() {
        let raw = r#"{
            "TrxId": "trx-1",
            "Publisher": "pub-a",
            "TimeStamp": 1700000000000000000,
            "GroupId": "g1",
            "Data": { "type": "Like", "object": { "type": "Note", "id": "p1" } }
        }"#;
        let content: NodeContent = serde_json::from_str(raw).unwrap();
        assert_eq!(content.trx_id, TrxId::new("trx-1"));
        assert_eq!(content.timestamp, 1_700_000_000_000_000_000);
    }

    #[test]
    fn parses_pub_queue() {
        let raw = r#"{
            "GroupId": "g1",
            "Data": [
                { "State": "FAIL", "RetryCount": 11, "Trx": { "TrxId": "t1" } },
                { "State": "SUCCESS", "Trx": { "TrxId": "t2" } }
            ]
        }"#;
        let response: PubQueueResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.into_items(),
            vec![
                PubQueueItem {
                    trx_id: TrxId::new("t1"),
                    group_id: "g1".into(),
                    state: PubQueueState::Fail,
                    retry_count: 11,
                },
                PubQueueItem {
                    trx_id: TrxId::new("t2"),
                    group_id: "g1".into(),
                    state: PubQueueState::Success,
                    retry_count: 0,
                },
            ]
        );
    }

    #[test]
    fn malformed_envelope_keeps_its_place() {
        let raw = r#"[
            { "TrxId": "t1", "Publisher": "pub-a", "TimeStamp": 1, "Data": {} },
            { "TrxId": "t2", "TimeStamp": 2, "Data": {} },
            { "Publisher": "pub-b", "TimeStamp": 3 },
            { "TrxId": "t4", "Publisher": "pub-a", "TimeStamp": "late", "Data": {} }
        ]"#;
        let items: Vec<Value> = serde_json::from_str(raw).unwrap();
        let page = parse_content_page(items, "g1");

        let ids: Vec<&str> = page.iter().map(|content| content.trx_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t4"]);
        assert!(page.iter().all(|content| content.group_id == "g1"));
        assert_eq!(page[0].publisher, "pub-a");
        assert_eq!(page[1].data, Value::Null);
        assert_eq!(page[1].timestamp, 2);
        assert_eq!(page[2].timestamp, 0);
    }

    #[test]
    fn groups_response_skips_unusable_entries() {
        let raw = r#"{ "groups": [
            { "group_id": "g1", "user_pubkey": "me" },
            { "group_id": "g2", "user_pubkey": "me", "group_status": "SYNC_PAUSED" },
            { "group_id": "g3", "user_pubkey": " " },
            { "group_id": "g4" }
        ] }"#;
        let response: GroupsResponse = serde_json::from_str(raw).unwrap();
        let ids: Vec<String> = response
            .into_groups()
            .into_iter()
            .map(|group| group.group_id)
            .collect();
        assert_eq!(ids, vec!["g1".to_string()]);
    }

    #[test]
    fn group_requires_user_pubkey() {
        let raw = r#"{ "group_id": "g1", "user_pubkey": " " }"#;
        let response: GroupResponse = serde_json::from_str(raw).unwrap();
        assert!(Group::try_from(response).is_err());
    }

    #[test]
    fn group_status_defaults_to_synced() {
        let raw = r#"{ "group_id": "g1", "group_name": "town", "user_pubkey": "me" }"#;
        let response: GroupResponse = serde_json::from_str(raw).unwrap();
        let group = Group::try_from(response).unwrap();
        assert_eq!(group.sync_state, GroupSyncState::Synced);
    }
}
