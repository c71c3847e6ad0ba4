//! Like and dislike counters

use crate::classify::CounterPayload;
use crate::db::{CommentRepository, CounterRepository, PostRepository, SqlitePostRepository};
use crate::error::Result;
use crate::models::{
    ContentStatus, Counter, NotificationKind, ObjectType, SummaryDelta, TrxId,
};
use crate::sync::engine::{Effects, MergePage};

use super::{adjust_comment, adjust_post, notify_owner, reconcile, Envelope, Reconcile};

/// Merge counters. Each publisher's reaction is replayed from stored
/// counters in timestamp order, so a repeated like changes nothing and a
/// late undo only retracts what came before it.
pub fn merge_counters(
    page: &MergePage<'_>,
    items: Vec<(Envelope, CounterPayload)>,
    effects: &mut Effects,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let repo = CounterRepository::new(page.conn);
    let ids: Vec<TrxId> = items.iter().map(|(envelope, _)| envelope.trx_id.clone()).collect();
    let existing = repo.get_many(&ids)?;

    for (envelope, payload) in items {
        let stored = existing.get(&envelope.trx_id);
        match reconcile(
            stored.map(|counter| (counter.status, counter.publisher.as_str())),
            &envelope.publisher,
        ) {
            Reconcile::Insert => apply_counter(page, &repo, envelope, payload, effects)?,
            Reconcile::Confirm => {
                // The delta was applied when the counter was submitted
                repo.set_status(&envelope.trx_id, ContentStatus::Synced)?;
            }
            Reconcile::Skip => {
                tracing::trace!(trx_id = %envelope.trx_id, "Skipping already stored counter");
            }
        }
    }
    Ok(())
}

fn apply_counter(
    page: &MergePage<'_>,
    repo: &CounterRepository<'_>,
    envelope: Envelope,
    payload: CounterPayload,
    effects: &mut Effects,
) -> Result<()> {
    let object_type = target_type(page, &payload.object_id)?;
    let delta = repo.insert_replayed(&Counter {
        trx_id: envelope.trx_id.clone(),
        group_id: page.group_id().to_string(),
        object_id: payload.object_id.clone(),
        object_type,
        publisher: envelope.publisher.clone(),
        timestamp: envelope.timestamp,
        kind: payload.kind,
        status: ContentStatus::Synced,
    })?;

    if delta.is_zero() {
        tracing::trace!(
            trx_id = %envelope.trx_id,
            kind = %payload.kind,
            "Counter does not change the reaction"
        );
        return Ok(());
    }

    let notification = notification_kind(delta);
    match object_type {
        ObjectType::Post => {
            if let Some(post) = adjust_post(page.conn, &payload.object_id, delta)? {
                if let Some(kind) = notification {
                    if notify_owner(page, &post.publisher, &envelope, &post.trx_id, object_type, kind)? {
                        effects.latest_status_changed = true;
                    }
                }
                effects.patch_post(post);
            }
        }
        ObjectType::Comment => {
            if let Some(comment) = adjust_comment(page.conn, &payload.object_id, delta)? {
                if let Some(kind) = notification {
                    if notify_owner(
                        page,
                        &comment.publisher,
                        &envelope,
                        &comment.trx_id,
                        object_type,
                        kind,
                    )? {
                        effects.latest_status_changed = true;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Counters for objects not yet stored are assumed to target posts
fn target_type(page: &MergePage<'_>, object_id: &TrxId) -> Result<ObjectType> {
    if SqlitePostRepository::new(page.conn).get(object_id)?.is_some() {
        return Ok(ObjectType::Post);
    }
    if CommentRepository::new(page.conn).get(object_id)?.is_some() {
        return Ok(ObjectType::Comment);
    }
    Ok(ObjectType::Post)
}

/// Only new likes and dislikes notify; undos are silent
fn notification_kind(delta: SummaryDelta) -> Option<NotificationKind> {
    if delta.like > 0 {
        Some(NotificationKind::Like)
    } else if delta.dislike > 0 {
        Some(NotificationKind::Dislike)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_never_notifies() {
        let undo = SummaryDelta {
            like: -1,
            ..SummaryDelta::default()
        };
        assert_eq!(notification_kind(undo), None);
        let dislike = SummaryDelta {
            dislike: 1,
            ..SummaryDelta::default()
        };
        assert_eq!(notification_kind(dislike), Some(NotificationKind::Dislike));
    }
}
