use std::collections::HashMap;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rum_core::config::SyncSettings;
use rum_core::models::{Comment, Group, Notification, Post, Relation, TrxId};
use rum_core::node::HttpNodeClient;
use rum_core::services::StoreService;
use rum_core::sync::SyncContext;
use serde::Serialize;

use crate::error::CliError;

const NANOS_PER_MILLI: i64 = 1_000_000;

#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub trx_id: String,
    pub publisher: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub preview: String,
    pub content: String,
    pub status: String,
    pub likes: i64,
    pub dislikes: i64,
    pub comments: i64,
    pub hot: i64,
    pub transfers: i64,
    pub timestamp: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct CommentListItem {
    pub trx_id: String,
    pub reply_to: Option<String>,
    pub publisher: String,
    pub author: Option<String>,
    pub content: String,
    pub status: String,
    pub likes: i64,
    pub replies: i64,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct NotificationItem {
    pub id: i64,
    pub kind: String,
    pub object_id: String,
    pub object_type: String,
    pub from_publisher: String,
    pub unread: bool,
    pub timestamp_iso: String,
}

#[derive(Debug, Serialize)]
pub struct RelationItem {
    pub trx_id: String,
    pub target: String,
    pub kind: String,
    pub status: String,
    pub timestamp_iso: String,
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rum")
        .join("rum.db")
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rum")
        .join("settings.json")
}

/// Settings file, then environment, then command-line flags
pub fn load_settings(
    config_path: Option<&Path>,
    db_path: Option<PathBuf>,
) -> Result<SyncSettings, CliError> {
    let config_path = config_path.map_or_else(default_config_path, Path::to_path_buf);
    let mut settings = SyncSettings::load(&config_path)?.with_env_overrides();
    if let Some(db_path) = db_path {
        settings.db_path = Some(db_path);
    }
    Ok(settings.validated()?)
}

pub fn resolve_db_path(settings: &SyncSettings) -> PathBuf {
    settings.db_path.clone().unwrap_or_else(default_db_path)
}

pub fn open_store(settings: &SyncSettings) -> Result<StoreService, CliError> {
    Ok(StoreService::open_path(resolve_db_path(settings))?)
}

/// Build a sync context talking to the configured node
pub fn connect(settings: &SyncSettings, store: StoreService) -> Result<Arc<SyncContext>, CliError> {
    let node_url = settings.require_node_url()?;
    let node = HttpNodeClient::new(node_url, settings.jwt.clone())?;
    Ok(Arc::new(SyncContext::new(
        store,
        Arc::new(node),
        settings.clone(),
    )))
}

pub async fn require_group(store: &StoreService, group_id: &str) -> Result<Group, CliError> {
    store
        .get_group(group_id.trim())
        .await?
        .ok_or_else(|| CliError::GroupNotFound(group_id.trim().to_string()))
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_trx_id(trx_id: &str) -> Result<TrxId, CliError> {
    let trimmed = trx_id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyTrxId)
    } else {
        Ok(TrxId::new(trimmed))
    }
}

/// Content from the arguments, falling back to piped stdin
pub fn resolve_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }
    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }
    Err(CliError::EmptyContent)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Display names for every publisher in `publishers`
pub async fn author_names<'a>(
    store: &StoreService,
    group_id: &str,
    publishers: impl IntoIterator<Item = &'a str>,
) -> Result<HashMap<String, String>, CliError> {
    let mut names = HashMap::new();
    for publisher in publishers {
        if names.contains_key(publisher) {
            continue;
        }
        if let Some(profile) = store.latest_profile(group_id, publisher).await? {
            names.insert(publisher.to_string(), profile.name);
        }
    }
    Ok(names)
}

pub fn short_key(key: &str) -> String {
    key.chars().take(8).collect()
}

pub fn format_post_lines(posts: &[Post], names: &HashMap<String, String>) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    posts
        .iter()
        .map(|post| {
            let author = names
                .get(&post.publisher)
                .cloned()
                .unwrap_or_else(|| short_key(&post.publisher));
            let relative_time = format_relative_time(post.timestamp / NANOS_PER_MILLI, now_ms);
            let preview = post.preview(40);
            let summary = &post.summary;
            let mut line = format!(
                "{:<36}  {author:<12}  {preview:<40}  +{} -{} c{}  {relative_time}",
                post.trx_id.as_str(),
                summary.like_count,
                summary.dislike_count,
                summary.comment_count
            );
            if post.status.is_pending() {
                line.push_str(&format!("  [{}]", post.status));
            }
            line
        })
        .collect()
}

pub fn post_to_list_item(post: &Post, names: &HashMap<String, String>) -> PostListItem {
    let now_ms = Utc::now().timestamp_millis();
    PostListItem {
        trx_id: post.trx_id.to_string(),
        publisher: post.publisher.clone(),
        author: names.get(&post.publisher).cloned(),
        title: post.name.clone(),
        preview: post.preview(80),
        content: post.content.clone(),
        status: post.status.to_string(),
        likes: post.summary.like_count,
        dislikes: post.summary.dislike_count,
        comments: post.summary.comment_count,
        hot: post.summary.hot_count,
        transfers: post.summary.transfer_count,
        timestamp: post.timestamp,
        relative_time: format_relative_time(post.timestamp / NANOS_PER_MILLI, now_ms),
    }
}

pub fn format_comment_lines(comments: &[Comment], names: &HashMap<String, String>) -> Vec<String> {
    comments
        .iter()
        .map(|comment| {
            let author = names
                .get(&comment.publisher)
                .cloned()
                .unwrap_or_else(|| short_key(&comment.publisher));
            let indent = if comment.reply_to.is_some() { "  ↳ " } else { "" };
            format!(
                "{indent}{}  {author}: {}",
                comment.trx_id,
                comment.content.split_whitespace().collect::<Vec<_>>().join(" ")
            )
        })
        .collect()
}

pub fn comment_to_list_item(comment: &Comment, names: &HashMap<String, String>) -> CommentListItem {
    CommentListItem {
        trx_id: comment.trx_id.to_string(),
        reply_to: comment.reply_to.as_ref().map(ToString::to_string),
        publisher: comment.publisher.clone(),
        author: names.get(&comment.publisher).cloned(),
        content: comment.content.clone(),
        status: comment.status.to_string(),
        likes: comment.summary.like_count,
        replies: comment.summary.comment_count,
        timestamp: comment.timestamp,
    }
}

pub fn format_notification_lines(notifications: &[Notification]) -> Vec<String> {
    notifications
        .iter()
        .map(|notification| {
            let marker = if notification.unread { "*" } else { " " };
            format!(
                "{marker} {}  {:<8} {} on {} {}",
                format_timestamp(notification.timestamp),
                notification.kind.as_str(),
                short_key(&notification.from_publisher),
                notification.object_type,
                notification.object_id
            )
        })
        .collect()
}

pub fn notification_to_item(notification: &Notification) -> NotificationItem {
    NotificationItem {
        id: notification.id,
        kind: notification.kind.to_string(),
        object_id: notification.object_id.to_string(),
        object_type: notification.object_type.to_string(),
        from_publisher: notification.from_publisher.clone(),
        unread: notification.unread,
        timestamp_iso: format_timestamp(notification.timestamp),
    }
}

pub fn format_relation_lines(relations: &[Relation], names: &HashMap<String, String>) -> Vec<String> {
    relations
        .iter()
        .map(|relation| {
            let target = names
                .get(&relation.target)
                .cloned()
                .unwrap_or_else(|| short_key(&relation.target));
            let mut line = format!("{:<6}  {target}", relation.kind.as_str());
            if relation.status.is_pending() {
                line.push_str(&format!("  [{}]", relation.status));
            }
            line
        })
        .collect()
}

pub fn relation_to_item(relation: &Relation) -> RelationItem {
    RelationItem {
        trx_id: relation.trx_id.to_string(),
        target: relation.target.clone(),
        kind: relation.kind.to_string(),
        status: relation.status.to_string(),
        timestamp_iso: format_timestamp(relation.timestamp),
    }
}

/// UTC label for a node timestamp in nanoseconds
pub fn format_timestamp(timestamp_ns: i64) -> String {
    let timestamp_ms = timestamp_ns / NANOS_PER_MILLI;
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ns.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
