use rum_core::config::SyncSettings;

use crate::commands::common::{
    author_names, comment_to_list_item, format_comment_lines, format_notification_lines,
    format_post_lines, format_relation_lines, normalize_trx_id, notification_to_item, open_store,
    post_to_list_item, relation_to_item, require_group, CommentListItem, NotificationItem,
    PostListItem, RelationItem,
};
use crate::error::CliError;

pub async fn run_groups(settings: &SyncSettings, as_json: bool) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let groups = store.list_groups().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }
    if groups.is_empty() {
        println!("No groups synced yet. Run `rum run` first.");
        return Ok(());
    }
    for group in groups {
        println!(
            "{}  {:<24}  {}",
            group.group_id,
            group.group_name,
            group.sync_state.as_str()
        );
    }
    Ok(())
}

pub async fn run_posts(
    settings: &SyncSettings,
    group_id: &str,
    publisher: Option<&str>,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let group = require_group(&store, group_id).await?;
    let publisher = publisher.map(str::trim).filter(|key| !key.is_empty());
    let posts = match publisher {
        Some(key) => {
            store
                .list_posts_by_publisher(&group.group_id, key, limit)
                .await?
        }
        None => store.list_posts(&group.group_id, limit, 0).await?,
    };
    let names = author_names(
        &store,
        &group.group_id,
        posts.iter().map(|post| post.publisher.as_str()),
    )
    .await?;

    if as_json {
        let json_items = posts
            .iter()
            .map(|post| post_to_list_item(post, &names))
            .collect::<Vec<PostListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_post_lines(&posts, &names) {
            println!("{line}");
        }
    }

    // Viewing the whole feed consumes the unread post counter
    if publisher.is_none() {
        store.clear_unread_posts(&group.group_id).await?;
    }
    Ok(())
}

pub async fn run_relations(
    settings: &SyncSettings,
    group_id: &str,
    publisher: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let group = require_group(&store, group_id).await?;
    let publisher = publisher
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .unwrap_or(group.user_pubkey.as_str());
    let relations = store.relations_of(&group.group_id, publisher).await?;

    if as_json {
        let json_items = relations
            .iter()
            .map(relation_to_item)
            .collect::<Vec<RelationItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if relations.is_empty() {
        println!("No follows or blocks.");
        return Ok(());
    }
    let names = author_names(
        &store,
        &group.group_id,
        relations.iter().map(|relation| relation.target.as_str()),
    )
    .await?;
    for line in format_relation_lines(&relations, &names) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_comments(
    settings: &SyncSettings,
    post_id: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let post_id = normalize_trx_id(post_id)?;
    let comments = store.list_comments(&post_id, limit).await?;
    let group_id = comments
        .first()
        .map(|comment| comment.group_id.clone())
        .unwrap_or_default();
    let names = author_names(
        &store,
        &group_id,
        comments.iter().map(|comment| comment.publisher.as_str()),
    )
    .await?;

    if as_json {
        let json_items = comments
            .iter()
            .map(|comment| comment_to_list_item(comment, &names))
            .collect::<Vec<CommentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if comments.is_empty() {
        println!("No comments yet.");
        return Ok(());
    }
    for line in format_comment_lines(&comments, &names) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_notifications(
    settings: &SyncSettings,
    group_id: &str,
    mark_read: bool,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let group = require_group(&store, group_id).await?;
    let notifications = store
        .list_notifications(&group.group_id, false, limit)
        .await?;

    if as_json {
        let json_items = notifications
            .iter()
            .map(notification_to_item)
            .collect::<Vec<NotificationItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notifications.is_empty() {
        println!("No notifications.");
    } else {
        for line in format_notification_lines(&notifications) {
            println!("{line}");
        }
    }

    if mark_read {
        let changed = store.mark_notifications_read(&group.group_id).await?;
        if !as_json {
            println!("Marked {changed} notification(s) read");
        }
    }
    Ok(())
}

pub async fn run_status(settings: &SyncSettings, group_id: &str, as_json: bool) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let group = require_group(&store, group_id).await?;
    let status = store.latest_status(&group.group_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!("group          {}", group.group_name);
    println!("node state     {}", group.sync_state.as_str());
    println!("unread posts   {}", status.unread_count);
    println!(
        "notifications  {} (likes {}, dislikes {}, comments {}, replies {})",
        status.unread_notifications(),
        status.unread_likes,
        status.unread_dislikes,
        status.unread_comments,
        status.unread_replies
    );
    if let Some(latest) = &status.latest_trx_id {
        println!("latest         {latest}");
    }
    Ok(())
}

pub async fn run_clear(settings: &SyncSettings, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }
    let store = open_store(settings)?;
    store.clear_all().await?;
    println!("Cleared local data");
    Ok(())
}
