//! Optimistic submission of local activities.
//!
//! The activity goes to the node first. Only once the node has assigned a
//! trx id is the local record written, as `syncing` (or `waiting` while the
//! node is still catching up on the group). The remote echo later flips it
//! to `synced` through the regular merge path.

use std::sync::Arc;

use serde_json::{json, Value};

use super::merge::{adjust_comment, adjust_post};
use super::SyncContext;
use crate::classify::MAX_IMAGES;
use crate::db::{
    CommentRepository, CounterRepository, PostRepository, ProfileRepository, RelationRepository,
    SqlitePostRepository,
};
use crate::error::{Error, Result};
use crate::models::{
    Comment, ContentStatus, Counter, CounterKind, Group, Image, ObjectType, Post, Profile,
    Relation, RelationKind, Summary, SummaryDelta, TrxId,
};
use crate::util::{normalize_text_option, unix_nanos_now};

pub struct Submitter {
    ctx: Arc<SyncContext>,
}

impl Submitter {
    pub const fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Publish a new post
    pub async fn post(
        &self,
        group_id: &str,
        content: &str,
        name: Option<String>,
        images: Vec<Image>,
    ) -> Result<Post> {
        validate_body(content, &images)?;
        let name = normalize_text_option(name);
        let group = self.group(group_id).await?;

        let mut object = json!({ "type": "Note", "content": content.trim() });
        if let Some(name) = &name {
            object["name"] = json!(name);
        }
        if !images.is_empty() {
            object["image"] = images_json(&images);
        }
        let trx_id = self
            .submit(&group, &json!({ "type": "Create", "object": object }))
            .await?;

        let post = Post {
            trx_id,
            group_id: group.group_id.clone(),
            publisher: group.user_pubkey.clone(),
            timestamp: unix_nanos_now(),
            name,
            content: content.trim().to_string(),
            images,
            status: pending_status(&group),
            deleted: false,
            summary: Summary::default(),
        };
        {
            let db = self.ctx.store.lock().await;
            SqlitePostRepository::new(db.connection()).insert(&post)?;
        }
        self.ctx.view.insert_post(&post);
        Ok(post)
    }

    /// Comment on a post, or reply to one of its comments
    pub async fn comment(
        &self,
        group_id: &str,
        post_id: &TrxId,
        reply_to: Option<&TrxId>,
        content: &str,
        images: Vec<Image>,
    ) -> Result<Comment> {
        validate_body(content, &images)?;
        let group = self.group(group_id).await?;

        let object_id = match reply_to {
            Some(parent_id) => {
                let parent = self
                    .ctx
                    .store
                    .get_comment(parent_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("comment {parent_id}")))?;
                parent.object_id
            }
            None => post_id.clone(),
        };
        let target = reply_to.unwrap_or(post_id);

        let mut object = json!({
            "type": "Note",
            "content": content.trim(),
            "inreplyto": { "type": "Note", "id": target.as_str() },
        });
        if !images.is_empty() {
            object["image"] = images_json(&images);
        }
        let trx_id = self
            .submit(&group, &json!({ "type": "Create", "object": object }))
            .await?;

        let comment = Comment {
            trx_id,
            group_id: group.group_id.clone(),
            object_id,
            reply_to: reply_to.cloned(),
            publisher: group.user_pubkey.clone(),
            timestamp: unix_nanos_now(),
            content: content.trim().to_string(),
            images,
            status: pending_status(&group),
            summary: Summary::default(),
        };
        let one_comment = SummaryDelta {
            comment: 1,
            ..SummaryDelta::default()
        };

        let post = {
            let mut db = self.ctx.store.lock().await;
            let tx = db.connection_mut().transaction()?;
            CommentRepository::new(&tx).insert(&comment)?;
            let post = adjust_post(&tx, &comment.object_id, one_comment)?;
            if let Some(parent_id) = &comment.reply_to {
                adjust_comment(&tx, parent_id, one_comment)?;
            }
            tx.commit()?;
            post
        };
        if let Some(post) = post {
            self.ctx.view.patch_post(&post);
        }
        self.ctx.view.comment_added(&comment);
        Ok(comment)
    }

    /// Like, dislike or undo either on a post or comment. A reaction that
    /// would change nothing is rejected before reaching the node.
    pub async fn react(&self, group_id: &str, object_id: &TrxId, kind: CounterKind) -> Result<Counter> {
        let group = self.group(group_id).await?;

        let object_type = {
            let db = self.ctx.store.lock().await;
            let conn = db.connection();
            let object_type = if SqlitePostRepository::new(conn).get(object_id)?.is_some() {
                ObjectType::Post
            } else if CommentRepository::new(conn).get(object_id)?.is_some() {
                ObjectType::Comment
            } else {
                return Err(Error::NotFound(format!("object {object_id}")));
            };
            let reaction =
                CounterRepository::new(conn).reaction(object_id, &group.user_pubkey)?;
            if reaction.apply(kind).1.is_zero() {
                return Err(Error::InvalidInput(format!(
                    "{kind} does not change the current reaction"
                )));
            }
            object_type
        };

        let trx_id = self.submit(&group, &counter_activity(object_id, kind)).await?;

        let counter = Counter {
            trx_id,
            group_id: group.group_id.clone(),
            object_id: object_id.clone(),
            object_type,
            publisher: group.user_pubkey.clone(),
            timestamp: unix_nanos_now(),
            kind,
            status: pending_status(&group),
        };

        let post = {
            let mut db = self.ctx.store.lock().await;
            let tx = db.connection_mut().transaction()?;
            let delta = CounterRepository::new(&tx).insert_replayed(&counter)?;
            let post = match object_type {
                ObjectType::Post => adjust_post(&tx, object_id, delta)?,
                ObjectType::Comment => {
                    adjust_comment(&tx, object_id, delta)?;
                    None
                }
            };
            tx.commit()?;
            post
        };
        if let Some(post) = post {
            self.ctx.view.patch_post(&post);
        }
        Ok(counter)
    }

    pub async fn update_profile(
        &self,
        group_id: &str,
        name: &str,
        avatar: Option<Image>,
        wallet: Option<String>,
    ) -> Result<Profile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("profile name cannot be empty".to_string()));
        }
        if let Some(avatar) = &avatar {
            validate_images(std::slice::from_ref(avatar))?;
        }
        let wallet = normalize_text_option(wallet);
        let group = self.group(group_id).await?;

        let mut object = json!({ "type": "Profile", "name": name });
        if let Some(avatar) = &avatar {
            object["image"] = images_json(std::slice::from_ref(avatar));
        }
        if let Some(wallet) = &wallet {
            object["wallet"] = json!([{ "id": wallet }]);
        }
        let trx_id = self
            .submit(&group, &json!({ "type": "Create", "object": object }))
            .await?;

        let profile = Profile {
            trx_id,
            group_id: group.group_id.clone(),
            publisher: group.user_pubkey.clone(),
            timestamp: unix_nanos_now(),
            name: name.to_string(),
            avatar,
            wallet,
            status: pending_status(&group),
        };
        {
            let db = self.ctx.store.lock().await;
            ProfileRepository::new(db.connection()).insert(&profile)?;
        }
        self.ctx
            .view
            .profile_changed(&profile.group_id, &profile.publisher);
        Ok(profile)
    }

    /// Follow, block or undo either
    pub async fn relate(&self, group_id: &str, target: &str, kind: RelationKind) -> Result<Relation> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::InvalidInput("relation target cannot be empty".to_string()));
        }
        let group = self.group(group_id).await?;
        if target == group.user_pubkey {
            return Err(Error::InvalidInput("cannot relate to yourself".to_string()));
        }

        let trx_id = self.submit(&group, &relation_activity(target, kind)).await?;
        let relation = Relation {
            trx_id,
            group_id: group.group_id.clone(),
            publisher: group.user_pubkey.clone(),
            target: target.to_string(),
            kind,
            timestamp: unix_nanos_now(),
            status: pending_status(&group),
        };
        {
            let db = self.ctx.store.lock().await;
            RelationRepository::new(db.connection()).insert(&relation)?;
        }
        self.ctx
            .view
            .profile_changed(&relation.group_id, &relation.publisher);
        Ok(relation)
    }

    /// Delete one of the local user's posts
    pub async fn delete_post(&self, group_id: &str, post_id: &TrxId) -> Result<()> {
        let group = self.group(group_id).await?;
        let post = self
            .ctx
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("post {post_id}")))?;
        if post.publisher != group.user_pubkey {
            return Err(Error::InvalidInput(
                "only the author can delete a post".to_string(),
            ));
        }

        self.submit(
            &group,
            &json!({
                "type": "Delete",
                "object": { "type": "Note", "id": post_id.as_str() },
            }),
        )
        .await?;

        let post = {
            let db = self.ctx.store.lock().await;
            let repo = SqlitePostRepository::new(db.connection());
            repo.mark_deleted(post_id, &group.user_pubkey)?;
            repo.get(post_id)?
        };
        if let Some(post) = post {
            self.ctx.view.patch_post(&post);
        }
        Ok(())
    }

    async fn group(&self, group_id: &str) -> Result<Group> {
        self.ctx
            .store
            .get_group(group_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("group {group_id}")))
    }

    async fn submit(&self, group: &Group, activity: &Value) -> Result<TrxId> {
        let trx_id = self.ctx.node.submit(&group.group_id, activity).await?;
        tracing::debug!(
            group_id = %group.group_id,
            %trx_id,
            kind = activity["type"].as_str().unwrap_or_default(),
            "Submitted activity"
        );
        Ok(trx_id)
    }
}

fn pending_status(group: &Group) -> ContentStatus {
    if group.sync_state.is_catching_up() {
        ContentStatus::Waiting
    } else {
        ContentStatus::Syncing
    }
}

fn validate_body(content: &str, images: &[Image]) -> Result<()> {
    if content.trim().is_empty() && images.is_empty() {
        return Err(Error::InvalidInput("content cannot be empty".to_string()));
    }
    validate_images(images)
}

fn validate_images(images: &[Image]) -> Result<()> {
    if images.len() > MAX_IMAGES {
        return Err(Error::InvalidInput(format!(
            "at most {MAX_IMAGES} images are allowed"
        )));
    }
    if let Some(image) = images
        .iter()
        .find(|image| !image.media_type.starts_with("image/") || image.content.is_empty())
    {
        return Err(Error::InvalidInput(format!(
            "unsupported image attachment: {}",
            image.media_type
        )));
    }
    Ok(())
}

fn images_json(images: &[Image]) -> Value {
    images
        .iter()
        .map(|image| {
            json!({
                "type": "Image",
                "mediaType": image.media_type,
                "content": image.content,
            })
        })
        .collect()
}

fn counter_activity(object_id: &TrxId, kind: CounterKind) -> Value {
    let note = json!({ "type": "Note", "id": object_id.as_str() });
    match kind {
        CounterKind::Like => json!({ "type": "Like", "object": note }),
        CounterKind::Dislike => json!({ "type": "Dislike", "object": note }),
        CounterKind::UndoLike => json!({
            "type": "Undo",
            "object": { "type": "Like", "object": note },
        }),
        CounterKind::UndoDislike => json!({
            "type": "Undo",
            "object": { "type": "Dislike", "object": note },
        }),
    }
}

fn relation_activity(target: &str, kind: RelationKind) -> Value {
    let person = json!({ "type": "Person", "id": target });
    match kind {
        RelationKind::Follow => json!({ "type": "Follow", "object": person }),
        RelationKind::Block => json!({ "type": "Block", "object": person }),
        RelationKind::Unfollow => json!({
            "type": "Undo",
            "object": { "type": "Follow", "object": person },
        }),
        RelationKind::Unblock => json!({
            "type": "Undo",
            "object": { "type": "Block", "object": person },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, Activity};

    #[test]
    fn built_activities_classify_back() {
        let object_id = TrxId::new("p1");
        for kind in [
            CounterKind::Like,
            CounterKind::Dislike,
            CounterKind::UndoLike,
            CounterKind::UndoDislike,
        ] {
            match classify(&counter_activity(&object_id, kind)) {
                Activity::Counter(payload) => {
                    assert_eq!(payload.kind, kind);
                    assert_eq!(payload.object_id, object_id);
                }
                other => panic!("unexpected activity {other:?}"),
            }
        }
        for kind in [
            RelationKind::Follow,
            RelationKind::Unfollow,
            RelationKind::Block,
            RelationKind::Unblock,
        ] {
            match classify(&relation_activity("bob", kind)) {
                Activity::Relation(payload) => assert_eq!(payload.kind, kind),
                other => panic!("unexpected activity {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_bad_bodies() {
        assert!(validate_body("  ", &[]).is_err());
        let image = Image {
            media_type: "image/png".into(),
            content: "aGk=".into(),
        };
        assert!(validate_body("", std::slice::from_ref(&image)).is_ok());
        assert!(validate_body("hi", &vec![image; MAX_IMAGES + 1]).is_err());
        let text = Image {
            media_type: "text/plain".into(),
            content: "aGk=".into(),
        };
        assert!(validate_body("hi", &[text]).is_err());
    }
}
