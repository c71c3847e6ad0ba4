//! Generic poll-merge engine.
//!
//! A [`Poller`] drives one [`SyncTask`] on a timer: load the cursor, fetch a
//! page, classify it, merge it and save the cursor in one store transaction,
//! then apply post-commit effects. Pages of one task never overlap.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::watch;

use super::SyncContext;
use crate::config::SyncSettings;
use crate::db::versions::{self, Table};
use crate::db::SyncRepository;
use crate::error::Result;
use crate::models::{Category, Comment, Cursor, Group, Post, TrxId};
use crate::node::NodeResult;
use crate::state::SyncState;

/// Tables backing a read cache; their version moves trigger invalidation
const CACHED_TABLES: [Table; 2] = [Table::Profiles, Table::Relations];

/// Whether a task runs once per group or once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    PerGroup,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Background groups are polled on ticks divisible by this
    pub background_every: u32,
}

impl PollPolicy {
    pub fn for_category(settings: &SyncSettings, category: Category) -> Self {
        Self {
            interval: settings.interval(category),
            background_every: settings.background_every.max(1),
        }
    }

    /// The active group is polled every tick, the others every Nth
    pub fn should_poll(&self, active: bool, tick: u64) -> bool {
        active || tick % u64::from(self.background_every.max(1)) == 0
    }
}

/// What a merge handler sees of the page being merged
pub struct MergePage<'a> {
    pub conn: &'a Connection,
    pub group: Option<&'a Group>,
    pub settings: &'a SyncSettings,
}

impl MergePage<'_> {
    pub fn group_id(&self) -> &str {
        self.group.map_or("", |group| group.group_id.as_str())
    }

    /// The local user's publisher key in this group
    pub fn my_pubkey(&self) -> Option<&str> {
        self.group.map(|group| group.user_pubkey.as_str())
    }

    pub fn is_mine(&self, publisher: &str) -> bool {
        self.my_pubkey() == Some(publisher)
    }
}

/// Work to perform once a merge transaction has committed
#[derive(Debug, Default)]
pub struct Effects {
    pub patched_posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub profiles: Vec<(String, String)>,
    /// New posts from other publishers
    pub arrived_posts: usize,
    pub latest_status_changed: bool,
    /// Pub queue entries to acknowledge on the node
    pub ack: Vec<TrxId>,
}

impl Effects {
    pub fn patch_post(&mut self, post: Post) {
        self.patched_posts.retain(|existing| existing.trx_id != post.trx_id);
        self.patched_posts.push(post);
    }
}

/// One polling category: where pages come from and how they are merged.
#[async_trait]
pub trait SyncTask: Send + Sync + 'static {
    /// Item as returned by the node
    type Raw: Send + 'static;
    /// Item after classification
    type Item: Send;

    fn category(&self) -> Category;

    fn scope(&self) -> Scope {
        Scope::PerGroup
    }

    async fn fetch(
        &self,
        ctx: &SyncContext,
        group: Option<&Group>,
        cursor: &Cursor,
    ) -> NodeResult<Vec<Self::Raw>>;

    /// `None` drops the item
    fn classify(&self, raw: Self::Raw) -> Option<Self::Item>;

    /// Cursor to persist after merging `page`. `None` keeps no cursor.
    fn next_cursor(&self, _cursor: &Cursor, _page: &[Self::Raw]) -> Option<Cursor> {
        None
    }

    /// Apply items inside the page transaction
    fn merge(&self, page: &MergePage<'_>, items: Vec<Self::Item>, effects: &mut Effects)
        -> Result<()>;
}

pub struct Poller<T> {
    task: T,
    ctx: Arc<SyncContext>,
    policy: PollPolicy,
}

impl<T: SyncTask> Poller<T> {
    pub fn new(task: T, ctx: Arc<SyncContext>) -> Self {
        let policy = PollPolicy::for_category(&ctx.settings, task.category());
        Self { task, ctx, policy }
    }

    /// Poll until the quit flag is raised. A tick in progress completes.
    pub async fn run(self, mut quit: watch::Receiver<bool>) {
        let category = self.task.category();
        tracing::info!(
            %category,
            interval_ms = u64::try_from(self.policy.interval.as_millis()).unwrap_or(u64::MAX),
            "Poller starting"
        );

        let mut tick: u64 = 0;
        loop {
            if *quit.borrow() {
                break;
            }

            self.tick(tick).await;
            tick = tick.wrapping_add(1);

            tokio::select! {
                changed = quit.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.policy.interval) => {}
            }
        }

        self.ctx.view.set_sync_state(category, SyncState::Offline);
        tracing::info!(%category, "Poller stopped");
    }

    /// Run one tick over every due target. Returns the number of fetched
    /// items. Failures are logged and leave cursors untouched.
    pub async fn tick(&self, tick: u64) -> usize {
        let category = self.task.category();
        let targets = match self.task.scope() {
            Scope::Global => vec![None],
            Scope::PerGroup => match self.ctx.store.list_groups().await {
                Ok(groups) => groups
                    .into_iter()
                    .filter(|group| {
                        self.policy
                            .should_poll(self.ctx.is_active(&group.group_id), tick)
                    })
                    .map(Some)
                    .collect(),
                Err(error) => {
                    tracing::warn!(%category, %error, "Failed to load groups");
                    self.ctx.view.set_sync_state(category, SyncState::Error);
                    return 0;
                }
            },
        };

        let mut fetched = 0;
        let mut failed = false;
        for group in &targets {
            match self.poll(group.as_ref()).await {
                Ok(count) => fetched += count,
                Err(error) => {
                    failed = true;
                    tracing::warn!(
                        %category,
                        group_id = group.as_ref().map_or("", |group| group.group_id.as_str()),
                        %error,
                        "Poll failed, retrying next tick"
                    );
                }
            }
        }

        let state = if failed {
            SyncState::Error
        } else {
            SyncState::Synced
        };
        self.ctx.view.set_sync_state(category, state);
        fetched
    }

    /// Fetch and merge one page for `group`
    pub async fn poll(&self, group: Option<&Group>) -> Result<usize> {
        let category = self.task.category();
        let group_id = group.map_or("", |group| group.group_id.as_str());

        let cursor = self.ctx.store.cursor(group_id, category).await?;
        let page = self.task.fetch(&self.ctx, group, &cursor).await?;
        if page.is_empty() {
            return Ok(0);
        }

        let fetched = page.len();
        let next_cursor = self.task.next_cursor(&cursor, &page);
        let items: Vec<T::Item> = page
            .into_iter()
            .filter_map(|raw| self.task.classify(raw))
            .collect();
        let classified = items.len();

        let mut effects = Effects::default();
        let moved = {
            let mut db = self.ctx.store.lock().await;
            let tx = db.connection_mut().transaction()?;
            let before = cached_versions(&tx)?;

            let merge_page = MergePage {
                conn: &tx,
                group,
                settings: &self.ctx.settings,
            };
            self.task.merge(&merge_page, items, &mut effects)?;
            if let Some(next) = &next_cursor {
                SyncRepository::new(&tx).save_cursor(group_id, category, next)?;
            }

            let after = cached_versions(&tx)?;
            tx.commit()?;
            CACHED_TABLES
                .into_iter()
                .zip(before.into_iter().zip(after))
                .filter(|(_, (before, after))| before != after)
                .map(|(table, _)| table)
                .collect::<Vec<_>>()
        };

        self.ctx.store.caches().invalidate_tables(&moved);
        self.apply_effects(group_id, effects).await;

        tracing::debug!(%category, group_id, fetched, classified, "Merged page");
        Ok(fetched)
    }

    async fn apply_effects(&self, group_id: &str, effects: Effects) {
        let view = &self.ctx.view;
        for post in &effects.patched_posts {
            view.patch_post(post);
        }
        for comment in &effects.comments {
            view.comment_added(comment);
        }
        for (group_id, publisher) in &effects.profiles {
            view.profile_changed(group_id, publisher);
        }
        view.posts_arrived(group_id, effects.arrived_posts);

        if effects.latest_status_changed {
            match self.ctx.store.latest_status(group_id).await {
                Ok(status) => view.latest_status_changed(status),
                Err(error) => tracing::warn!(group_id, %error, "Failed to read latest status"),
            }
        }

        if !effects.ack.is_empty() {
            match self.ctx.node.ack(&effects.ack).await {
                Ok(acked) => tracing::debug!(group_id, acked = acked.len(), "Acknowledged pub queue"),
                Err(error) => tracing::warn!(group_id, %error, "Pub queue ack failed"),
            }
        }
    }
}

fn cached_versions(conn: &Connection) -> Result<Vec<u64>> {
    CACHED_TABLES
        .into_iter()
        .map(|table| versions::current(conn, table))
        .collect()
}
