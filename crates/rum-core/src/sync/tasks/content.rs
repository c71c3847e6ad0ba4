//! Group content: posts, comments, reactions, profiles, relations, deletes

use std::collections::HashSet;

use async_trait::async_trait;

use crate::classify::{classify, Activity};
use crate::error::Result;
use crate::models::{Category, Cursor, Group};
use crate::node::{NodeContent, NodeResult};
use crate::sync::engine::{Effects, MergePage, SyncTask};
use crate::sync::merge::{
    merge_comments, merge_counters, merge_deletes, merge_posts, merge_profiles, merge_relations,
    Envelope,
};
use crate::sync::SyncContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub envelope: Envelope,
    pub activity: Activity,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContentTask;

#[async_trait]
impl SyncTask for ContentTask {
    type Raw = NodeContent;
    type Item = ContentItem;

    fn category(&self) -> Category {
        Category::Content
    }

    async fn fetch(
        &self,
        ctx: &SyncContext,
        group: Option<&Group>,
        cursor: &Cursor,
    ) -> NodeResult<Vec<NodeContent>> {
        let Some(group) = group else {
            return Ok(Vec::new());
        };
        ctx.node
            .fetch_contents(&group.group_id, cursor, ctx.settings.page_size)
            .await
    }

    fn classify(&self, raw: NodeContent) -> Option<ContentItem> {
        let activity = classify(&raw.data);
        if activity == Activity::Unknown {
            tracing::trace!(trx_id = %raw.trx_id, "Dropping unrecognized content");
            return None;
        }
        Some(ContentItem {
            envelope: Envelope {
                trx_id: raw.trx_id,
                publisher: raw.publisher,
                timestamp: raw.timestamp,
            },
            activity,
        })
    }

    /// The cursor follows the node's delivery order and never moves back
    /// in time.
    fn next_cursor(&self, cursor: &Cursor, page: &[NodeContent]) -> Option<Cursor> {
        page.last()
            .map(|last| cursor.resumed_after(last.timestamp, last.trx_id.clone()))
    }

    fn merge(&self, page: &MergePage<'_>, items: Vec<ContentItem>, effects: &mut Effects) -> Result<()> {
        let mut posts = Vec::new();
        let mut comments = Vec::new();
        let mut profiles = Vec::new();
        let mut relations = Vec::new();
        let mut counters = Vec::new();
        let mut deletes = Vec::new();

        let mut seen = HashSet::new();
        for ContentItem { envelope, activity } in items {
            if !seen.insert(envelope.trx_id.clone()) {
                continue;
            }
            match activity {
                Activity::PostCreate(payload) => posts.push((envelope, payload)),
                Activity::CommentCreate(payload) => comments.push((envelope, payload)),
                Activity::Profile(payload) => profiles.push((envelope, payload)),
                Activity::Relation(payload) => relations.push((envelope, payload)),
                Activity::Counter(payload) => counters.push((envelope, payload)),
                Activity::Delete(payload) => deletes.push((envelope, payload)),
                Activity::Unknown => {}
            }
        }

        // Targets first so reactions and deletes in the same page find them
        merge_posts(page, posts, effects)?;
        merge_comments(page, comments, effects)?;
        merge_profiles(page, profiles, effects)?;
        merge_relations(page, relations, effects)?;
        merge_counters(page, counters, effects)?;
        merge_deletes(page, deletes, effects)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrxId;
    use serde_json::json;

    fn content(trx_id: &str, timestamp: i64, data: serde_json::Value) -> NodeContent {
        NodeContent {
            trx_id: TrxId::new(trx_id),
            publisher: "alice".into(),
            timestamp,
            group_id: "g1".into(),
            data,
        }
    }

    #[test]
    fn unknown_content_is_dropped() {
        let task = ContentTask;
        assert!(task
            .classify(content("t1", 1, json!({"type": "Announce"})))
            .is_none());
        let item = task
            .classify(content(
                "t2",
                2,
                json!({"type": "Create", "object": {"type": "Note", "content": "hi"}}),
            ))
            .unwrap();
        assert_eq!(item.activity.kind_name(), "post");
        assert_eq!(item.envelope.publisher, "alice");
    }

    #[test]
    fn cursor_follows_last_item_without_going_back() {
        let task = ContentTask;
        let cursor = Cursor {
            timestamp: 50,
            trx_id: Some(TrxId::new("t0")),
        };
        let page = vec![
            content("t1", 60, json!({})),
            content("t2", 40, json!({})),
        ];
        assert_eq!(
            task.next_cursor(&cursor, &page),
            Some(Cursor {
                timestamp: 50,
                trx_id: Some(TrxId::new("t2")),
            })
        );
        assert_eq!(task.next_cursor(&cursor, &[]), None);
    }

    #[test]
    fn undecodable_envelope_still_moves_the_cursor() {
        let task = ContentTask;
        let page = vec![content("t1", 3, serde_json::Value::Null)];
        assert!(task.classify(page[0].clone()).is_none());
        assert_eq!(
            task.next_cursor(&Cursor::default(), &page),
            Some(Cursor {
                timestamp: 3,
                trx_id: Some(TrxId::new("t1")),
            })
        );
    }
}
