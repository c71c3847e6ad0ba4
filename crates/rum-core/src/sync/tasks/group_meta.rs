//! Group metadata: the joined groups, their producers and tips

use async_trait::async_trait;

use crate::db::SyncRepository;
use crate::error::Result;
use crate::models::{Category, Cursor, Group, Producer, SummaryDelta, Transfer, TrxId};
use crate::node::NodeResult;
use crate::sync::engine::{Effects, MergePage, Scope, SyncTask};
use crate::sync::merge::adjust_post;
use crate::sync::SyncContext;

/// Mirrors the node's joined groups. Groups the node left are removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupsTask;

#[async_trait]
impl SyncTask for GroupsTask {
    type Raw = Group;
    type Item = Group;

    fn category(&self) -> Category {
        Category::Groups
    }

    fn scope(&self) -> Scope {
        Scope::Global
    }

    async fn fetch(
        &self,
        ctx: &SyncContext,
        _group: Option<&Group>,
        _cursor: &Cursor,
    ) -> NodeResult<Vec<Group>> {
        ctx.node.list_groups().await
    }

    fn classify(&self, raw: Group) -> Option<Group> {
        Some(raw)
    }

    fn merge(&self, page: &MergePage<'_>, items: Vec<Group>, _effects: &mut Effects) -> Result<()> {
        let repo = SyncRepository::new(page.conn);
        for group in &items {
            repo.upsert_group(group)?;
        }
        let keep: Vec<String> = items.into_iter().map(|group| group.group_id).collect();
        let removed = repo.retain_groups(&keep)?;
        if removed > 0 {
            tracing::info!(removed, "Dropped groups the node no longer reports");
        }
        Ok(())
    }
}

/// Replaces a group's producer list wholesale
#[derive(Debug, Default, Clone, Copy)]
pub struct ProducersTask;

#[async_trait]
impl SyncTask for ProducersTask {
    type Raw = Producer;
    type Item = Producer;

    fn category(&self) -> Category {
        Category::Producers
    }

    async fn fetch(
        &self,
        ctx: &SyncContext,
        group: Option<&Group>,
        _cursor: &Cursor,
    ) -> NodeResult<Vec<Producer>> {
        let Some(group) = group else {
            return Ok(Vec::new());
        };
        ctx.node.producers(&group.group_id).await
    }

    fn classify(&self, raw: Producer) -> Option<Producer> {
        Some(raw)
    }

    fn merge(&self, page: &MergePage<'_>, items: Vec<Producer>, _effects: &mut Effects) -> Result<()> {
        SyncRepository::new(page.conn).replace_producers(page.group_id(), &items)
    }
}

/// Records tips and counts them on the post they were sent for
#[derive(Debug, Default, Clone, Copy)]
pub struct TransfersTask;

#[async_trait]
impl SyncTask for TransfersTask {
    type Raw = Transfer;
    type Item = Transfer;

    fn category(&self) -> Category {
        Category::Transfers
    }

    async fn fetch(
        &self,
        ctx: &SyncContext,
        group: Option<&Group>,
        cursor: &Cursor,
    ) -> NodeResult<Vec<Transfer>> {
        let Some(group) = group else {
            return Ok(Vec::new());
        };
        ctx.node
            .transfers(&group.group_id, cursor, ctx.settings.page_size)
            .await
    }

    fn classify(&self, raw: Transfer) -> Option<Transfer> {
        Some(raw)
    }

    /// Transfers sharing a timestamp are told apart by the last id seen
    fn next_cursor(&self, cursor: &Cursor, page: &[Transfer]) -> Option<Cursor> {
        let last = page.last()?;
        let newest = page.iter().map(|transfer| transfer.timestamp).max()?;
        Some(cursor.resumed_after(newest, TrxId::new(last.id.as_str())))
    }

    fn merge(&self, page: &MergePage<'_>, items: Vec<Transfer>, effects: &mut Effects) -> Result<()> {
        let repo = SyncRepository::new(page.conn);
        let one_transfer = SummaryDelta {
            transfer: 1,
            ..SummaryDelta::default()
        };
        for transfer in items {
            if !repo.insert_transfer(&transfer)? {
                continue;
            }
            if let Some(post) = adjust_post(page.conn, &transfer.object_id, one_transfer)? {
                effects.patch_post(post);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrxId;

    fn transfer(id: &str, timestamp: i64) -> Transfer {
        Transfer {
            id: id.into(),
            group_id: "g1".into(),
            object_id: TrxId::new("p1"),
            sender: "bob".into(),
            recipient: "alice".into(),
            amount: "1.5".into(),
            asset: "RUM".into(),
            timestamp,
        }
    }

    #[test]
    fn transfer_cursor_takes_latest_timestamp_and_last_id() {
        let cursor = Cursor {
            timestamp: 10,
            trx_id: None,
        };
        let page = vec![transfer("a", 30), transfer("b", 20)];
        assert_eq!(
            TransfersTask.next_cursor(&cursor, &page),
            Some(Cursor {
                timestamp: 30,
                trx_id: Some(TrxId::new("b")),
            })
        );
        assert_eq!(TransfersTask.next_cursor(&cursor, &[]), None);
    }

    #[test]
    fn transfer_cursor_moves_within_one_timestamp() {
        let cursor = Cursor {
            timestamp: 5,
            trx_id: Some(TrxId::new("a")),
        };
        let page = vec![transfer("b", 5), transfer("c", 5)];
        assert_eq!(
            TransfersTask.next_cursor(&cursor, &page),
            Some(Cursor {
                timestamp: 5,
                trx_id: Some(TrxId::new("c")),
            })
        );
    }
}
