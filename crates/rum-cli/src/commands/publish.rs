use rum_core::config::SyncSettings;
use rum_core::models::{CounterKind, RelationKind};
use rum_core::sync::Submitter;

use crate::commands::common::{connect, normalize_trx_id, open_store, resolve_content};
use crate::error::CliError;

fn submitter(settings: &SyncSettings) -> Result<Submitter, CliError> {
    let store = open_store(settings)?;
    Ok(Submitter::new(connect(settings, store)?))
}

pub async fn run_post(
    settings: &SyncSettings,
    group_id: &str,
    title: Option<String>,
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_content(content_parts)?;
    let post = submitter(settings)?
        .post(group_id.trim(), &content, title, Vec::new())
        .await?;
    println!("{} [{}]", post.trx_id, post.status);
    Ok(())
}

pub async fn run_comment(
    settings: &SyncSettings,
    group_id: &str,
    post_id: &str,
    reply_to: Option<&str>,
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_content(content_parts)?;
    let post_id = normalize_trx_id(post_id)?;
    let reply_to = reply_to.map(normalize_trx_id).transpose()?;
    let comment = submitter(settings)?
        .comment(
            group_id.trim(),
            &post_id,
            reply_to.as_ref(),
            &content,
            Vec::new(),
        )
        .await?;
    println!("{} [{}]", comment.trx_id, comment.status);
    Ok(())
}

pub async fn run_react(
    settings: &SyncSettings,
    group_id: &str,
    object_id: &str,
    kind: CounterKind,
) -> Result<(), CliError> {
    let object_id = normalize_trx_id(object_id)?;
    let counter = submitter(settings)?
        .react(group_id.trim(), &object_id, kind)
        .await?;
    println!("{} [{}]", counter.trx_id, counter.status);
    Ok(())
}

pub async fn run_delete(settings: &SyncSettings, group_id: &str, post_id: &str) -> Result<(), CliError> {
    let post_id = normalize_trx_id(post_id)?;

    submitter(settings)?
        .delete_post(group_id.trim(), &post_id)
        .await?;
    println!("Deleted post {post_id}");
    Ok(())
}

pub async fn run_profile(
    settings: &SyncSettings,
    group_id: &str,
    name: &str,
    wallet: Option<String>,
) -> Result<(), CliError> {
    let profile = submitter(settings)?
        .update_profile(group_id.trim(), name, None, wallet)
        .await?;
    println!("{} [{}]", profile.trx_id, profile.status);
    Ok(())
}

pub async fn run_relate(
    settings: &SyncSettings,
    group_id: &str,
    target: &str,
    kind: RelationKind,
) -> Result<(), CliError> {
    let relation = submitter(settings)?
        .relate(group_id.trim(), target, kind)
        .await?;
    println!("{} [{}]", relation.trx_id, relation.status);
    Ok(())
}
