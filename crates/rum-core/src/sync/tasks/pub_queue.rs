//! Delivery state of the local user's own submissions

use async_trait::async_trait;
use rusqlite::Connection;

use crate::db::{CommentRepository, CounterRepository, PostRepository, SqlitePostRepository, Table};
use crate::error::Result;
use crate::models::{
    Category, ContentStatus, Cursor, Group, ObjectType, PubQueueItem, PubQueueState, TrxId,
};
use crate::node::NodeResult;
use crate::sync::engine::{Effects, MergePage, SyncTask};
use crate::sync::merge::{derived_summary, set_status_anywhere};
use crate::sync::SyncContext;

/// Promotes `waiting` records once the node has accepted them and gives up
/// on submissions that exceeded the retry ceiling. The queue has no cursor.
#[derive(Debug, Default, Clone, Copy)]
pub struct PubQueueTask;

#[async_trait]
impl SyncTask for PubQueueTask {
    type Raw = PubQueueItem;
    type Item = PubQueueItem;

    fn category(&self) -> Category {
        Category::PubQueue
    }

    async fn fetch(
        &self,
        ctx: &SyncContext,
        group: Option<&Group>,
        _cursor: &Cursor,
    ) -> NodeResult<Vec<PubQueueItem>> {
        let Some(group) = group else {
            return Ok(Vec::new());
        };
        ctx.node.pub_queue(&group.group_id).await
    }

    fn classify(&self, raw: PubQueueItem) -> Option<PubQueueItem> {
        Some(raw)
    }

    fn merge(
        &self,
        page: &MergePage<'_>,
        items: Vec<PubQueueItem>,
        effects: &mut Effects,
    ) -> Result<()> {
        for item in items {
            match item.state {
                PubQueueState::Success => {
                    effects.ack.push(item.trx_id.clone());
                    if let Some(table) =
                        set_status_anywhere(page.conn, &item.trx_id, ContentStatus::Syncing)?
                    {
                        tracing::debug!(trx_id = %item.trx_id, table = table.name(), "Submission accepted by node");
                    }
                }
                PubQueueState::Fail if item.retry_count > page.settings.retry_ceiling => {
                    effects.ack.push(item.trx_id.clone());
                    if let Some(table) =
                        set_status_anywhere(page.conn, &item.trx_id, ContentStatus::Fail)?
                    {
                        tracing::warn!(
                            trx_id = %item.trx_id,
                            retries = item.retry_count,
                            table = table.name(),
                            "Submission failed permanently"
                        );
                        revert_failed(page.conn, table, &item.trx_id, effects)?;
                    }
                }
                PubQueueState::Fail | PubQueueState::Pending => {}
            }
        }
        Ok(())
    }
}

/// Rebuild the summaries a failed counter or comment had already changed
fn revert_failed(conn: &Connection, table: Table, trx_id: &TrxId, effects: &mut Effects) -> Result<()> {
    match table {
        Table::Counters => {
            let counters = CounterRepository::new(conn).get_many(std::slice::from_ref(trx_id))?;
            if let Some(counter) = counters.get(trx_id) {
                refresh_summary(conn, &counter.object_id, counter.object_type, effects)?;
            }
        }
        Table::Comments => {
            if let Some(comment) = CommentRepository::new(conn).get(trx_id)? {
                refresh_summary(conn, &comment.object_id, ObjectType::Post, effects)?;
                if let Some(parent) = &comment.reply_to {
                    refresh_summary(conn, parent, ObjectType::Comment, effects)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn refresh_summary(
    conn: &Connection,
    object_id: &TrxId,
    object_type: ObjectType,
    effects: &mut Effects,
) -> Result<()> {
    let summary = derived_summary(conn, object_id, object_type)?;
    match object_type {
        ObjectType::Post => {
            let repo = SqlitePostRepository::new(conn);
            if let Some(mut post) = repo.get(object_id)? {
                repo.update_summary(object_id, &summary)?;
                post.summary = summary;
                effects.patch_post(post);
            }
        }
        ObjectType::Comment => {
            let repo = CommentRepository::new(conn);
            if repo.get(object_id)?.is_some() {
                repo.update_summary(object_id, &summary)?;
            }
        }
    }
    Ok(())
}
