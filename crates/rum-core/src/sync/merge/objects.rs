//! Posts, comments and deletes

use crate::classify::{CommentPayload, DeletePayload, PostPayload};
use crate::db::{CommentRepository, NotificationRepository, PostRepository, SqlitePostRepository};
use crate::error::Result;
use crate::models::{
    Comment, ContentStatus, NotificationKind, ObjectType, Post, SummaryDelta, TrxId,
};
use crate::sync::engine::{Effects, MergePage};

use super::{
    adjust_comment, adjust_post, derived_summary, notify_owner, reconcile, Envelope, Reconcile,
};

pub fn merge_posts(
    page: &MergePage<'_>,
    items: Vec<(Envelope, PostPayload)>,
    effects: &mut Effects,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let repo = SqlitePostRepository::new(page.conn);
    let ids: Vec<TrxId> = items.iter().map(|(envelope, _)| envelope.trx_id.clone()).collect();
    let existing = repo.get_many(&ids)?;

    let mut arrived = 0_i64;
    let mut latest: Option<(TrxId, i64)> = None;

    for (envelope, payload) in items {
        let stored = existing.get(&envelope.trx_id);
        match reconcile(
            stored.map(|post| (post.status, post.publisher.as_str())),
            &envelope.publisher,
        ) {
            Reconcile::Insert => {
                let post = Post {
                    summary: derived_summary(page.conn, &envelope.trx_id, ObjectType::Post)?,
                    trx_id: envelope.trx_id,
                    group_id: page.group_id().to_string(),
                    publisher: envelope.publisher,
                    timestamp: envelope.timestamp,
                    name: payload.name,
                    content: payload.content,
                    images: payload.images,
                    status: ContentStatus::Synced,
                    deleted: false,
                };
                repo.insert(&post)?;

                if !page.is_mine(&post.publisher) {
                    arrived += 1;
                    if latest.as_ref().is_none_or(|(_, ts)| post.timestamp >= *ts) {
                        latest = Some((post.trx_id.clone(), post.timestamp));
                    }
                }
            }
            Reconcile::Confirm => {
                if repo.set_status(&envelope.trx_id, ContentStatus::Synced)? {
                    if let Some(mut post) = stored.cloned() {
                        post.status = ContentStatus::Synced;
                        effects.patch_post(post);
                    }
                }
            }
            Reconcile::Skip => {
                tracing::trace!(trx_id = %envelope.trx_id, "Skipping already stored post");
            }
        }
    }

    if let Some((latest_trx_id, latest_timestamp)) = latest {
        NotificationRepository::new(page.conn).record_unread_posts(
            page.group_id(),
            arrived,
            &latest_trx_id,
            latest_timestamp,
        )?;
        effects.arrived_posts += usize::try_from(arrived).unwrap_or_default();
        effects.latest_status_changed = true;
    }
    Ok(())
}

pub fn merge_comments(
    page: &MergePage<'_>,
    items: Vec<(Envelope, CommentPayload)>,
    effects: &mut Effects,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let repo = CommentRepository::new(page.conn);
    let ids: Vec<TrxId> = items.iter().map(|(envelope, _)| envelope.trx_id.clone()).collect();
    let existing = repo.get_many(&ids)?;
    let one_comment = SummaryDelta {
        comment: 1,
        ..SummaryDelta::default()
    };

    for (envelope, payload) in items {
        let stored = existing.get(&envelope.trx_id);
        match reconcile(
            stored.map(|comment| (comment.status, comment.publisher.as_str())),
            &envelope.publisher,
        ) {
            Reconcile::Insert => {
                // Replying to a comment attaches to that comment's post
                let parent = repo.get(&payload.in_reply_to)?;
                let object_id = parent
                    .as_ref()
                    .map_or_else(|| payload.in_reply_to.clone(), |parent| parent.object_id.clone());

                let comment = Comment {
                    summary: derived_summary(page.conn, &envelope.trx_id, ObjectType::Comment)?,
                    trx_id: envelope.trx_id.clone(),
                    group_id: page.group_id().to_string(),
                    object_id,
                    reply_to: parent.as_ref().map(|parent| parent.trx_id.clone()),
                    publisher: envelope.publisher.clone(),
                    timestamp: envelope.timestamp,
                    content: payload.content,
                    images: payload.images,
                    status: ContentStatus::Synced,
                };
                repo.insert(&comment)?;

                if let Some(post) = adjust_post(page.conn, &comment.object_id, one_comment)? {
                    if notify_owner(
                        page,
                        &post.publisher,
                        &envelope,
                        &post.trx_id,
                        ObjectType::Post,
                        NotificationKind::Comment,
                    )? {
                        effects.latest_status_changed = true;
                    }
                    effects.patch_post(post);
                }
                if let Some(parent) = parent {
                    adjust_comment(page.conn, &parent.trx_id, one_comment)?;
                    if notify_owner(
                        page,
                        &parent.publisher,
                        &envelope,
                        &parent.trx_id,
                        ObjectType::Comment,
                        NotificationKind::Reply,
                    )? {
                        effects.latest_status_changed = true;
                    }
                }
                effects.comments.push(comment);
            }
            Reconcile::Confirm => {
                if repo.set_status(&envelope.trx_id, ContentStatus::Synced)? {
                    if let Some(mut comment) = stored.cloned() {
                        comment.status = ContentStatus::Synced;
                        effects.comments.push(comment);
                    }
                }
            }
            Reconcile::Skip => {
                tracing::trace!(trx_id = %envelope.trx_id, "Skipping already stored comment");
            }
        }
    }
    Ok(())
}

/// Only the author may delete a post
pub fn merge_deletes(
    page: &MergePage<'_>,
    items: Vec<(Envelope, DeletePayload)>,
    effects: &mut Effects,
) -> Result<()> {
    let repo = SqlitePostRepository::new(page.conn);
    for (envelope, payload) in items {
        if repo.mark_deleted(&payload.object_id, &envelope.publisher)? {
            if let Some(post) = repo.get(&payload.object_id)? {
                effects.patch_post(post);
            }
        } else {
            tracing::trace!(
                trx_id = %envelope.trx_id,
                object_id = %payload.object_id,
                "Ignoring delete for unknown or foreign post"
            );
        }
    }
    Ok(())
}
