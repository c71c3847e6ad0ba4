//! Merge handlers for classified content.
//!
//! Every handler runs inside the page transaction. A trx id that is already
//! stored is either the echo of a local submission (flip it to `synced`) or
//! a re-delivery (skip it).

mod counters;
mod objects;
mod persons;

pub use counters::merge_counters;
pub use objects::{merge_comments, merge_deletes, merge_posts};
pub use persons::{merge_profiles, merge_relations};

use rusqlite::Connection;

use crate::db::{
    CommentRepository, CounterRepository, NotificationRepository, PostRepository,
    ProfileRepository, RelationRepository, SqlitePostRepository, SyncRepository, Table,
};
use crate::error::Result;
use crate::models::{
    Comment, ContentStatus, NewNotification, NotificationKind, ObjectType, Post, Summary,
    SummaryDelta, TrxId,
};

use super::engine::MergePage;

/// Envelope fields shared by every content item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub trx_id: TrxId,
    pub publisher: String,
    pub timestamp: i64,
}

/// How an incoming item relates to what is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    Insert,
    /// Local submission echoed back by the node
    Confirm,
    Skip,
}

/// Decide insert, confirm or skip for an incoming item
pub fn reconcile(existing: Option<(ContentStatus, &str)>, publisher: &str) -> Reconcile {
    match existing {
        None => Reconcile::Insert,
        Some((status, stored_publisher)) if status.is_pending() && stored_publisher == publisher => {
            Reconcile::Confirm
        }
        Some(_) => Reconcile::Skip,
    }
}

/// Move a record to `status` in whichever content table holds it
pub fn set_status_anywhere(
    conn: &Connection,
    trx_id: &TrxId,
    status: ContentStatus,
) -> Result<Option<Table>> {
    if SqlitePostRepository::new(conn).set_status(trx_id, status)? {
        return Ok(Some(Table::Posts));
    }
    if CommentRepository::new(conn).set_status(trx_id, status)? {
        return Ok(Some(Table::Comments));
    }
    if CounterRepository::new(conn).set_status(trx_id, status)? {
        return Ok(Some(Table::Counters));
    }
    if ProfileRepository::new(conn).set_status(trx_id, status)? {
        return Ok(Some(Table::Profiles));
    }
    if RelationRepository::new(conn).set_status(trx_id, status)? {
        return Ok(Some(Table::Relations));
    }
    Ok(None)
}

/// Summary of an object rebuilt from the stored counters, comments and
/// transfers that reference it
pub fn derived_summary(conn: &Connection, object_id: &TrxId, object_type: ObjectType) -> Result<Summary> {
    let reactions = CounterRepository::new(conn).aggregate_for(object_id)?;
    let comments = match object_type {
        ObjectType::Post => CommentRepository::new(conn).count_for_post(object_id)?,
        ObjectType::Comment => CommentRepository::new(conn).count_replies(object_id)?,
    };
    let transfers = match object_type {
        ObjectType::Post => SyncRepository::new(conn).count_transfers(object_id)?,
        ObjectType::Comment => 0,
    };

    let mut summary = Summary::default();
    summary.apply(SummaryDelta {
        like: reactions.like,
        dislike: reactions.dislike,
        comment: comments,
        transfer: transfers,
    });
    Ok(summary)
}

/// Apply a delta to a stored post, returning the updated post
pub fn adjust_post(conn: &Connection, post_id: &TrxId, delta: SummaryDelta) -> Result<Option<Post>> {
    let repo = SqlitePostRepository::new(conn);
    let Some(mut post) = repo.get(post_id)? else {
        return Ok(None);
    };
    if !delta.is_zero() {
        post.summary.apply(delta);
        repo.update_summary(&post.trx_id, &post.summary)?;
    }
    Ok(Some(post))
}

/// Apply a delta to a stored comment, returning the updated comment
pub fn adjust_comment(
    conn: &Connection,
    comment_id: &TrxId,
    delta: SummaryDelta,
) -> Result<Option<Comment>> {
    let repo = CommentRepository::new(conn);
    let Some(mut comment) = repo.get(comment_id)? else {
        return Ok(None);
    };
    if !delta.is_zero() {
        comment.summary.apply(delta);
        repo.update_summary(&comment.trx_id, &comment.summary)?;
    }
    Ok(Some(comment))
}

/// Record a notification when someone else acted on the local user's object.
/// Returns true when a new unread notification was stored.
pub fn notify_owner(
    page: &MergePage<'_>,
    owner: &str,
    actor: &Envelope,
    object_id: &TrxId,
    object_type: ObjectType,
    kind: NotificationKind,
) -> Result<bool> {
    if !page.is_mine(owner) || page.is_mine(&actor.publisher) {
        return Ok(false);
    }
    NotificationRepository::new(page.conn).insert(&NewNotification {
        group_id: page.group_id().to_string(),
        object_id: object_id.clone(),
        object_type,
        from_trx_id: actor.trx_id.clone(),
        from_publisher: actor.publisher.clone(),
        kind,
        timestamp: actor.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_decisions() {
        assert_eq!(reconcile(None, "alice"), Reconcile::Insert);
        assert_eq!(
            reconcile(Some((ContentStatus::Syncing, "alice")), "alice"),
            Reconcile::Confirm
        );
        assert_eq!(
            reconcile(Some((ContentStatus::Waiting, "alice")), "alice"),
            Reconcile::Confirm
        );
        assert_eq!(
            reconcile(Some((ContentStatus::Syncing, "alice")), "mallory"),
            Reconcile::Skip
        );
        for status in [ContentStatus::Synced, ContentStatus::Replaced, ContentStatus::Fail] {
            assert_eq!(reconcile(Some((status, "alice")), "alice"), Reconcile::Skip);
        }
    }
}
