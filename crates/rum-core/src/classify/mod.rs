//! Content-type classification for node activities.
//!
//! The node delivers every piece of group content as an opaque JSON activity.
//! [`classify`] inspects its shape and returns the matching [`Activity`]
//! variant. Classification never fails: anything that does not match a known
//! shape becomes [`Activity::Unknown`] and is dropped by the merge handlers.

use serde::Deserialize;

use crate::models::{CounterKind, Image, RelationKind, TrxId};

/// Maximum number of images accepted on a post or comment.
pub const MAX_IMAGES: usize = 4;

/// A classified activity payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    PostCreate(PostPayload),
    CommentCreate(CommentPayload),
    Profile(ProfilePayload),
    Counter(CounterPayload),
    Relation(RelationPayload),
    Delete(DeletePayload),
    Unknown,
}

impl Activity {
    /// Short name used in logs
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::PostCreate(_) => "post",
            Self::CommentCreate(_) => "comment",
            Self::Profile(_) => "profile",
            Self::Counter(_) => "counter",
            Self::Relation(_) => "relation",
            Self::Delete(_) => "delete",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPayload {
    pub name: Option<String>,
    pub content: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentPayload {
    /// Post or comment being replied to
    pub in_reply_to: TrxId,
    pub content: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePayload {
    pub name: String,
    pub avatar: Option<Image>,
    pub wallet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterPayload {
    pub object_id: TrxId,
    pub kind: CounterKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPayload {
    pub target: String,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePayload {
    pub object_id: TrxId,
}

/// Classify an activity by shape.
pub fn classify(data: &serde_json::Value) -> Activity {
    match RawActivity::deserialize(data) {
        Ok(raw) => raw.into_activity().unwrap_or(Activity::Unknown),
        Err(error) => {
            tracing::trace!("Unrecognized activity shape: {error}");
            Activity::Unknown
        }
    }
}

// ---------------------------------------------------------------------------
// Private
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawActivity {
    Create { object: RawCreateObject },
    Like { object: RawRef },
    Dislike { object: RawRef },
    Follow { object: RawRef },
    Block { object: RawRef },
    Delete { object: RawRef },
    Undo { object: Box<RawActivity> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawCreateObject {
    Note {
        #[serde(default)]
        content: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        image: Vec<RawImage>,
        #[serde(default)]
        inreplyto: Option<RawRef>,
    },
    Profile {
        name: String,
        #[serde(default)]
        image: Vec<RawImage>,
        #[serde(default)]
        wallet: Vec<RawWallet>,
    },
}

#[derive(Debug, Deserialize)]
struct RawRef {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

impl RawRef {
    fn note_id(&self) -> Option<TrxId> {
        (self.kind == "Note" && !self.id.trim().is_empty()).then(|| TrxId::new(self.id.trim()))
    }

    fn person_id(&self) -> Option<String> {
        (self.kind == "Person" && !self.id.trim().is_empty()).then(|| self.id.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "mediaType")]
    media_type: String,
    content: String,
}

impl RawImage {
    fn into_image(self) -> Option<Image> {
        let valid = self.kind == "Image"
            && self.media_type.starts_with("image/")
            && !self.content.is_empty();
        valid.then(|| Image {
            media_type: self.media_type,
            content: self.content,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawWallet {
    id: String,
}

fn collect_images(raw: Vec<RawImage>) -> Option<Vec<Image>> {
    if raw.len() > MAX_IMAGES {
        return None;
    }
    raw.into_iter().map(RawImage::into_image).collect()
}

impl RawActivity {
    fn into_activity(self) -> Option<Activity> {
        let activity = match self {
            Self::Create { object } => return object.into_activity(),
            Self::Like { object } => Activity::Counter(CounterPayload {
                object_id: object.note_id()?,
                kind: CounterKind::Like,
            }),
            Self::Dislike { object } => Activity::Counter(CounterPayload {
                object_id: object.note_id()?,
                kind: CounterKind::Dislike,
            }),
            Self::Follow { object } => Activity::Relation(RelationPayload {
                target: object.person_id()?,
                kind: RelationKind::Follow,
            }),
            Self::Block { object } => Activity::Relation(RelationPayload {
                target: object.person_id()?,
                kind: RelationKind::Block,
            }),
            Self::Delete { object } => Activity::Delete(DeletePayload {
                object_id: object.note_id()?,
            }),
            Self::Undo { object } => match *object {
                Self::Like { object } => Activity::Counter(CounterPayload {
                    object_id: object.note_id()?,
                    kind: CounterKind::UndoLike,
                }),
                Self::Dislike { object } => Activity::Counter(CounterPayload {
                    object_id: object.note_id()?,
                    kind: CounterKind::UndoDislike,
                }),
                Self::Follow { object } => Activity::Relation(RelationPayload {
                    target: object.person_id()?,
                    kind: RelationKind::Unfollow,
                }),
                Self::Block { object } => Activity::Relation(RelationPayload {
                    target: object.person_id()?,
                    kind: RelationKind::Unblock,
                }),
                _ => return None,
            },
        };
        Some(activity)
    }
}

impl RawCreateObject {
    fn into_activity(self) -> Option<Activity> {
        match self {
            Self::Note {
                content,
                name,
                image,
                inreplyto,
            } => {
                let images = collect_images(image)?;
                if content.trim().is_empty() && images.is_empty() {
                    return None;
                }
                if let Some(target) = inreplyto {
                    return Some(Activity::CommentCreate(CommentPayload {
                        in_reply_to: target.note_id()?,
                        content,
                        images,
                    }));
                }
                let name = name.filter(|name| !name.trim().is_empty());
                Some(Activity::PostCreate(PostPayload {
                    name,
                    content,
                    images,
                }))
            }
            Self::Profile {
                name,
                image,
                wallet,
            } => {
                let name = name.trim().to_string();
                if name.is_empty() || image.len() > 1 {
                    return None;
                }
                let avatar = match image.into_iter().next() {
                    Some(raw) => Some(raw.into_image()?),
                    None => None,
                };
                let wallet = wallet
                    .into_iter()
                    .map(|wallet| wallet.id.trim().to_string())
                    .find(|id| !id.is_empty());
                Some(Activity::Profile(ProfilePayload {
                    name,
                    avatar,
                    wallet,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn classifies_post() {
        let activity = classify(&json!({
            "type": "Create",
            "object": { "type": "Note", "name": "Hello", "content": "first post" }
        }));
        assert_eq!(
            activity,
            Activity::PostCreate(PostPayload {
                name: Some("Hello".into()),
                content: "first post".into(),
                images: Vec::new(),
            })
        );
    }

    #[test]
    fn classifies_comment_by_inreplyto() {
        let activity = classify(&json!({
            "type": "Create",
            "object": {
                "type": "Note",
                "content": "nice",
                "inreplyto": { "type": "Note", "id": "post-1" }
            }
        }));
        assert_eq!(
            activity,
            Activity::CommentCreate(CommentPayload {
                in_reply_to: TrxId::new("post-1"),
                content: "nice".into(),
                images: Vec::new(),
            })
        );
    }

    #[test]
    fn classifies_image_only_post() {
        let activity = classify(&json!({
            "type": "Create",
            "object": {
                "type": "Note",
                "image": [{ "type": "Image", "mediaType": "image/png", "content": "iVBOR" }]
            }
        }));
        let Activity::PostCreate(post) = activity else {
            panic!("expected post, got {activity:?}");
        };
        assert_eq!(post.images.len(), 1);
    }

    #[test]
    fn rejects_bad_attachments() {
        let too_many: Vec<_> = (0..5)
            .map(|_| json!({ "type": "Image", "mediaType": "image/png", "content": "x" }))
            .collect();
        assert_eq!(
            classify(&json!({
                "type": "Create",
                "object": { "type": "Note", "content": "x", "image": too_many }
            })),
            Activity::Unknown
        );
        assert_eq!(
            classify(&json!({
                "type": "Create",
                "object": {
                    "type": "Note",
                    "content": "x",
                    "image": [{ "type": "Image", "mediaType": "text/html", "content": "x" }]
                }
            })),
            Activity::Unknown
        );
    }

    #[test]
    fn classifies_profile_with_avatar_and_wallet() {
        let activity = classify(&json!({
            "type": "Create",
            "object": {
                "type": "Profile",
                "name": " alice ",
                "image": [{ "type": "Image", "mediaType": "image/jpeg", "content": "abc" }],
                "wallet": [{ "id": "wallet-1", "type": "mixin", "name": "mixin messenger" }]
            }
        }));
        assert_eq!(
            activity,
            Activity::Profile(ProfilePayload {
                name: "alice".into(),
                avatar: Some(Image {
                    media_type: "image/jpeg".into(),
                    content: "abc".into(),
                }),
                wallet: Some("wallet-1".into()),
            })
        );
    }

    #[test]
    fn classifies_counters_and_undo() {
        assert_eq!(
            classify(&json!({ "type": "Like", "object": { "type": "Note", "id": "p1" } })),
            Activity::Counter(CounterPayload {
                object_id: TrxId::new("p1"),
                kind: CounterKind::Like,
            })
        );
        assert_eq!(
            classify(&json!({
                "type": "Undo",
                "object": { "type": "Dislike", "object": { "type": "Note", "id": "p1" } }
            })),
            Activity::Counter(CounterPayload {
                object_id: TrxId::new("p1"),
                kind: CounterKind::UndoDislike,
            })
        );
    }

    #[test]
    fn classifies_relations() {
        assert_eq!(
            classify(&json!({
                "type": "Undo",
                "object": { "type": "Follow", "object": { "type": "Person", "id": "bob" } }
            })),
            Activity::Relation(RelationPayload {
                target: "bob".into(),
                kind: RelationKind::Unfollow,
            })
        );
        assert_eq!(
            classify(&json!({ "type": "Follow", "object": { "type": "Note", "id": "bob" } })),
            Activity::Unknown
        );
    }

    #[test]
    fn classifies_delete() {
        assert_eq!(
            classify(&json!({ "type": "Delete", "object": { "type": "Note", "id": "p9" } })),
            Activity::Delete(DeletePayload {
                object_id: TrxId::new("p9")
            })
        );
    }

    #[test]
    fn malformed_input_is_unknown() {
        for value in [
            json!(null),
            json!("text"),
            json!({ "type": "Announce", "object": {} }),
            json!({ "type": "Create", "object": { "type": "Note", "content": "  " } }),
            json!({ "type": "Like", "object": { "type": "Note", "id": "" } }),
            json!({ "type": "Undo", "object": { "type": "Delete", "object": { "type": "Note", "id": "x" } } }),
            json!({ "type": "Create", "object": { "type": "Profile", "name": "" } }),
        ] {
            assert_eq!(classify(&value), Activity::Unknown, "{value}");
        }
    }
}
