//! Observable view state shared with front ends.
//!
//! Holds the posts currently on screen for the active group. Merge handlers
//! patch those posts after each commit and broadcast a [`ViewEvent`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::models::{Category, Comment, ContentStatus, LatestStatus, Post, Summary, TrxId};

const EVENT_CAPACITY: usize = 256;

/// Health of one polling category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// A post was added to the visible list
    PostInserted(Post),
    /// A visible post changed
    PostPatched {
        trx_id: TrxId,
        status: ContentStatus,
        deleted: bool,
        summary: Summary,
    },
    /// New posts from other publishers arrived in a group
    PostsArrived { group_id: String, count: usize },
    CommentAdded(Comment),
    ProfileChanged { group_id: String, publisher: String },
    LatestStatusChanged(LatestStatus),
    SyncStateChanged { category: Category, state: SyncState },
}

#[derive(Default)]
struct ViewInner {
    active_group: Option<String>,
    posts: Vec<Post>,
    sync_states: HashMap<Category, SyncState>,
}

pub struct ViewState {
    inner: Mutex<ViewInner>,
    events: broadcast::Sender<ViewEvent>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(ViewInner::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ViewInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ViewEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn active_group(&self) -> Option<String> {
        self.lock().active_group.clone()
    }

    /// Switch the focused group. Visible posts are cleared when it changes.
    pub fn set_active_group(&self, group_id: Option<String>) {
        let mut inner = self.lock();
        if inner.active_group != group_id {
            inner.active_group = group_id;
            inner.posts.clear();
        }
    }

    /// Replace the visible posts, typically after reading a page from the store
    pub fn show_posts(&self, posts: Vec<Post>) {
        self.lock().posts = posts;
    }

    pub fn visible_posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    /// Put a post at the top of the visible list when it belongs to the
    /// active group
    pub fn insert_post(&self, post: &Post) {
        {
            let mut inner = self.lock();
            if inner.active_group.as_deref() != Some(post.group_id.as_str()) {
                return;
            }
            if inner.posts.iter().any(|visible| visible.trx_id == post.trx_id) {
                return;
            }
            inner.posts.insert(0, post.clone());
        }
        self.emit(ViewEvent::PostInserted(post.clone()));
    }

    /// Update a visible post in place. Returns false when it is not on screen.
    pub fn patch_post(&self, post: &Post) -> bool {
        let patched = {
            let mut inner = self.lock();
            inner
                .posts
                .iter_mut()
                .find(|visible| visible.trx_id == post.trx_id)
                .map(|visible| {
                    visible.status = post.status;
                    visible.deleted = post.deleted;
                    visible.summary = post.summary;
                })
                .is_some()
        };
        if patched {
            self.emit(ViewEvent::PostPatched {
                trx_id: post.trx_id.clone(),
                status: post.status,
                deleted: post.deleted,
                summary: post.summary,
            });
        }
        patched
    }

    pub fn posts_arrived(&self, group_id: &str, count: usize) {
        if count > 0 {
            self.emit(ViewEvent::PostsArrived {
                group_id: group_id.to_string(),
                count,
            });
        }
    }

    pub fn comment_added(&self, comment: &Comment) {
        self.emit(ViewEvent::CommentAdded(comment.clone()));
    }

    pub fn profile_changed(&self, group_id: &str, publisher: &str) {
        self.emit(ViewEvent::ProfileChanged {
            group_id: group_id.to_string(),
            publisher: publisher.to_string(),
        });
    }

    pub fn latest_status_changed(&self, status: LatestStatus) {
        self.emit(ViewEvent::LatestStatusChanged(status));
    }

    pub fn sync_state(&self, category: Category) -> SyncState {
        self.lock()
            .sync_states
            .get(&category)
            .copied()
            .unwrap_or(SyncState::Offline)
    }

    /// Record a category's state, broadcasting only real changes
    pub fn set_sync_state(&self, category: Category, state: SyncState) {
        let previous = self.lock().sync_states.insert(category, state);
        if previous != Some(state) {
            self.emit(ViewEvent::SyncStateChanged { category, state });
        }
    }

    /// Forget everything on screen
    pub fn reset(&self) {
        self.lock().posts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(trx_id: &str) -> Post {
        Post {
            trx_id: TrxId::new(trx_id),
            group_id: "g1".into(),
            publisher: "alice".into(),
            timestamp: 1,
            name: None,
            content: "hi".into(),
            images: Vec::new(),
            status: ContentStatus::Syncing,
            deleted: false,
            summary: Summary::default(),
        }
    }

    #[test]
    fn insert_requires_active_group() {
        let view = ViewState::new();
        view.insert_post(&post("t1"));
        assert!(view.visible_posts().is_empty());

        view.set_active_group(Some("g1".into()));
        view.insert_post(&post("t1"));
        view.insert_post(&post("t1"));
        assert_eq!(view.visible_posts().len(), 1);
    }

    #[test]
    fn patch_only_touches_visible_posts() {
        let view = ViewState::new();
        let mut events = view.subscribe();
        view.set_active_group(Some("g1".into()));
        view.show_posts(vec![post("t1")]);

        let mut synced = post("t1");
        synced.status = ContentStatus::Synced;
        synced.summary.like_count = 1;
        assert!(view.patch_post(&synced));
        assert!(!view.patch_post(&post("t2")));

        assert_eq!(view.visible_posts()[0].summary.like_count, 1);
        assert!(matches!(
            events.try_recv(),
            Ok(ViewEvent::PostPatched {
                status: ContentStatus::Synced,
                ..
            })
        ));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn sync_state_broadcasts_changes_once() {
        let view = ViewState::new();
        let mut events = view.subscribe();
        view.set_sync_state(Category::Content, SyncState::Synced);
        view.set_sync_state(Category::Content, SyncState::Synced);

        assert!(events.try_recv().is_ok());
        assert!(events.try_recv().is_err());
        assert_eq!(view.sync_state(Category::Content), SyncState::Synced);
        assert_eq!(view.sync_state(Category::Groups), SyncState::Offline);
    }

    #[test]
    fn switching_group_clears_visible_posts() {
        let view = ViewState::new();
        view.set_active_group(Some("g1".into()));
        view.show_posts(vec![post("t1")]);
        view.set_active_group(Some("g2".into()));
        assert!(view.visible_posts().is_empty());
    }
}
