//! Shared store service used by the sync engine and front ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::cache::Caches;
use crate::db::{
    CommentRepository, Database, NotificationRepository, PostRepository, SqlitePostRepository,
    SyncRepository,
};
use crate::models::{
    Category, Comment, Cursor, Group, LatestStatus, Notification, Post, Producer, Profile,
    Relation, Transfer, TrxId,
};
use crate::Result;

/// Thread-safe handle to the local store and its read caches.
#[derive(Clone)]
pub struct StoreService {
    db: Arc<Mutex<Database>>,
    caches: Arc<Caches>,
    db_path: Option<PathBuf>,
}

impl StoreService {
    /// Open the store at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self::open_with_recovery(&db_path)?;
        tracing::info!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            caches: Arc::new(Caches::new()),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open_in_memory()?)),
            caches: Arc::new(Caches::new()),
            db_path: None,
        })
    }

    fn open_with_recovery(db_path: &Path) -> Result<Database> {
        match Database::open(db_path) {
            Ok(db) => Ok(db),
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local store at {} is not a database: {}. Quarantining and retrying once.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(db_path)?;
                Database::open(db_path)
            }
            Err(error) => Err(error),
        }
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };

        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));
            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local store from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        // WAL and shared-memory sidecars belong to the quarantined file
        for suffix in ["-wal", "-shm", "-journal"] {
            let sidecar = db_path.with_file_name(format!("{base_name}{suffix}"));
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
                tracing::warn!("Removed stale store file {}", sidecar.display());
            }
        }
        Ok(())
    }

    async fn reopen_after_corruption(&self) -> Result<bool> {
        let Some(db_path) = self.db_path.clone() else {
            return Ok(false);
        };

        tracing::warn!(
            "Detected invalid local store; reopening {}",
            db_path.display()
        );
        let mut db = self.db.lock().await;
        *db = Database::open_in_memory()?;
        Self::quarantine_corrupted_db_files(&db_path)?;
        *db = Database::open(&db_path)?;
        drop(db);
        self.caches.invalidate_all();
        Ok(true)
    }

    /// Run a read, reopening the store once if the file turned out corrupt
    async fn read<T>(&self, op: impl Fn(&Database, &Caches) -> Result<T>) -> Result<T> {
        let first_attempt = {
            let db = self.db.lock().await;
            op(&db, &self.caches)
        };

        match first_attempt {
            Err(error) if Self::is_corrupted_db_error(&error) => {
                if self.reopen_after_corruption().await? {
                    let db = self.db.lock().await;
                    op(&db, &self.caches)
                } else {
                    Err(error)
                }
            }
            other => other,
        }
    }

    /// Exclusive access for writers. Writers open their own transaction.
    pub async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Visible posts of a group, newest first.
    pub async fn list_posts(&self, group_id: &str, limit: usize, offset: usize) -> Result<Vec<Post>> {
        self.read(|db, _| SqlitePostRepository::new(db.connection()).list(group_id, limit, offset))
            .await
    }

    pub async fn list_posts_by_publisher(
        &self,
        group_id: &str,
        publisher: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.read(|db, _| {
            SqlitePostRepository::new(db.connection()).list_by_publisher(group_id, publisher, limit)
        })
        .await
    }

    pub async fn get_post(&self, trx_id: &TrxId) -> Result<Option<Post>> {
        self.read(|db, _| SqlitePostRepository::new(db.connection()).get(trx_id))
            .await
    }

    pub async fn get_comment(&self, trx_id: &TrxId) -> Result<Option<Comment>> {
        self.read(|db, _| CommentRepository::new(db.connection()).get(trx_id))
            .await
    }

    /// Comments of a post, oldest first.
    pub async fn list_comments(&self, post_id: &TrxId, limit: usize) -> Result<Vec<Comment>> {
        self.read(|db, _| CommentRepository::new(db.connection()).list_for_post(post_id, limit))
            .await
    }

    /// Latest live profile of a publisher, served from the read cache.
    pub async fn latest_profile(&self, group_id: &str, publisher: &str) -> Result<Option<Profile>> {
        self.read(|db, caches| caches.latest_profile(db.connection(), group_id, publisher))
            .await
    }

    /// Follows and blocks of a publisher, served from the read cache.
    pub async fn relations_of(&self, group_id: &str, publisher: &str) -> Result<Vec<Relation>> {
        self.read(|db, caches| caches.relations_of(db.connection(), group_id, publisher))
            .await
    }

    pub async fn list_notifications(
        &self,
        group_id: &str,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        self.read(|db, _| {
            NotificationRepository::new(db.connection()).list(group_id, unread_only, limit)
        })
        .await
    }

    /// Mark a group's notifications read, returning how many changed.
    pub async fn mark_notifications_read(&self, group_id: &str) -> Result<usize> {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let changed = NotificationRepository::new(&tx).mark_read(group_id)?;
        tx.commit()?;
        Ok(changed)
    }

    pub async fn clear_unread_posts(&self, group_id: &str) -> Result<()> {
        let db = self.db.lock().await;
        NotificationRepository::new(db.connection()).clear_unread_posts(group_id)
    }

    pub async fn latest_status(&self, group_id: &str) -> Result<LatestStatus> {
        self.read(|db, _| NotificationRepository::new(db.connection()).latest_status(group_id))
            .await
    }

    pub async fn cursor(&self, group_id: &str, category: Category) -> Result<Cursor> {
        self.read(|db, _| SyncRepository::new(db.connection()).cursor(group_id, category))
            .await
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.read(|db, _| SyncRepository::new(db.connection()).list_groups())
            .await
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        self.read(|db, _| SyncRepository::new(db.connection()).get_group(group_id))
            .await
    }

    pub async fn list_producers(&self, group_id: &str) -> Result<Vec<Producer>> {
        self.read(|db, _| SyncRepository::new(db.connection()).list_producers(group_id))
            .await
    }

    pub async fn list_transfers(&self, group_id: &str, limit: usize) -> Result<Vec<Transfer>> {
        self.read(|db, _| SyncRepository::new(db.connection()).list_transfers(group_id, limit))
            .await
    }

    /// Drop all locally synced data.
    pub async fn clear_all(&self) -> Result<()> {
        let mut db = self.db.lock().await;
        db.clear_all()?;
        drop(db);
        self.caches.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RelationRepository;
    use crate::models::{ContentStatus, GroupSyncState, RelationKind, Summary};
    use tempfile::tempdir;

    fn group() -> Group {
        Group {
            group_id: "g1".into(),
            group_name: "town".into(),
            user_pubkey: "me".into(),
            owner_pubkey: "owner".into(),
            sync_state: GroupSyncState::Synced,
        }
    }

    #[tokio::test]
    async fn in_memory_store_reads_what_was_written() {
        let store = StoreService::open_in_memory().unwrap();
        {
            let db = store.lock().await;
            SyncRepository::new(db.connection())
                .upsert_group(&group())
                .unwrap();
            SqlitePostRepository::new(db.connection())
                .insert(&Post {
                    trx_id: TrxId::new("t1"),
                    group_id: "g1".into(),
                    publisher: "me".into(),
                    timestamp: 1,
                    name: None,
                    content: "hello rum".into(),
                    images: Vec::new(),
                    status: ContentStatus::Synced,
                    deleted: false,
                    summary: Summary::default(),
                })
                .unwrap();
        }

        assert_eq!(store.list_groups().await.unwrap(), vec![group()]);
        let posts = store.list_posts("g1", 10, 0).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "hello rum");

        store.clear_all().await.unwrap();
        assert!(store.list_posts("g1", 10, 0).await.unwrap().is_empty());
        assert!(store.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn publisher_reads_filter_by_author() {
        let store = StoreService::open_in_memory().unwrap();
        {
            let db = store.lock().await;
            let posts = SqlitePostRepository::new(db.connection());
            for (trx, publisher, timestamp) in [("t1", "me", 1), ("t2", "bob", 2), ("t3", "me", 3)] {
                posts
                    .insert(&Post {
                        trx_id: TrxId::new(trx),
                        group_id: "g1".into(),
                        publisher: publisher.into(),
                        timestamp,
                        name: None,
                        content: format!("from {publisher}"),
                        images: Vec::new(),
                        status: ContentStatus::Synced,
                        deleted: false,
                        summary: Summary::default(),
                    })
                    .unwrap();
            }
            RelationRepository::new(db.connection())
                .insert(&Relation {
                    trx_id: TrxId::new("r1"),
                    group_id: "g1".into(),
                    publisher: "me".into(),
                    target: "bob".into(),
                    kind: RelationKind::Follow,
                    timestamp: 4,
                    status: ContentStatus::Syncing,
                })
                .unwrap();
        }

        let mine: Vec<_> = store
            .list_posts_by_publisher("g1", "me", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.trx_id)
            .collect();
        assert_eq!(mine, vec![TrxId::new("t3"), TrxId::new("t1")]);

        let relations = store.relations_of("g1", "me").await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target, "bob");
        assert!(store.relations_of("g1", "bob").await.unwrap().is_empty());
    }

    #[test]
    fn detects_corrupted_db_errors() {
        assert!(StoreService::is_corrupted_db_error(&crate::Error::Database(
            "file is not a database".to_string()
        )));
        assert!(!StoreService::is_corrupted_db_error(
            &crate::Error::InvalidInput("content cannot be empty".to_string())
        ));
    }

    #[tokio::test]
    async fn open_path_quarantines_garbage_file() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("rum.db");
        std::fs::write(&db_path, vec![b'x'; 4096]).unwrap();
        std::fs::write(tmp.path().join("rum.db-wal"), b"wal").unwrap();

        let store = StoreService::open_path(&db_path).unwrap();
        assert_eq!(store.db_path(), Some(db_path.as_path()));

        let backups: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("rum.db.corrupt-")
            })
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(store.list_groups().await.unwrap().is_empty());
    }
}
