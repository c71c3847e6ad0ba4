//! Post and comment repositories

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::versions::{self, Table};
use super::{json_column, parse_column, placeholders, predecessor_list, BATCH_CHUNK};
use crate::error::Result;
use crate::models::{Comment, ContentStatus, Post, Summary, TrxId};

const POST_COLUMNS: &str = "trx_id, group_id, publisher, timestamp, name, content, images, status,
     deleted, like_count, dislike_count, comment_count, hot_count, transfer_count";

const COMMENT_COLUMNS: &str = "trx_id, group_id, object_id, reply_to, publisher, timestamp, content,
     images, status, like_count, dislike_count, comment_count, hot_count, transfer_count";

/// Trait for post storage operations
pub trait PostRepository {
    /// Insert a new post
    fn insert(&self, post: &Post) -> Result<()>;

    /// Get a post by trx id, including deleted posts
    fn get(&self, trx_id: &TrxId) -> Result<Option<Post>>;

    /// Batched lookup; missing ids are absent from the map
    fn get_many(&self, trx_ids: &[TrxId]) -> Result<HashMap<TrxId, Post>>;

    /// Move a post forward to `status`. Returns false when the transition is
    /// not allowed from the stored status.
    fn set_status(&self, trx_id: &TrxId, status: ContentStatus) -> Result<bool>;

    /// Overwrite the aggregate counts
    fn update_summary(&self, trx_id: &TrxId, summary: &Summary) -> Result<()>;

    /// Flag a post as deleted when `publisher` authored it
    fn mark_deleted(&self, trx_id: &TrxId, publisher: &str) -> Result<bool>;

    /// List a group's visible posts, newest first
    fn list(&self, group_id: &str, limit: usize, offset: usize) -> Result<Vec<Post>>;

    /// List one publisher's visible posts in a group, newest first
    fn list_by_publisher(&self, group_id: &str, publisher: &str, limit: usize)
        -> Result<Vec<Post>>;
}

/// `SQLite` implementation of `PostRepository`
pub struct SqlitePostRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePostRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a post from a database row
    fn parse_post(row: &Row<'_>) -> rusqlite::Result<Post> {
        Ok(Post {
            trx_id: TrxId::new(row.get::<_, String>(0)?),
            group_id: row.get(1)?,
            publisher: row.get(2)?,
            timestamp: row.get(3)?,
            name: row.get(4)?,
            content: row.get(5)?,
            images: json_column(row, 6)?,
            status: parse_column(row, 7)?,
            deleted: row.get::<_, i32>(8)? != 0,
            summary: parse_summary(row, 9)?,
        })
    }
}

impl PostRepository for SqlitePostRepository<'_> {
    fn insert(&self, post: &Post) -> Result<()> {
        self.conn.execute(
            "INSERT INTO posts (trx_id, group_id, publisher, timestamp, name, content, images,
                 status, deleted, like_count, dislike_count, comment_count, hot_count, transfer_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                post.trx_id.as_str(),
                post.group_id,
                post.publisher,
                post.timestamp,
                post.name,
                post.content,
                serde_json::to_string(&post.images)?,
                post.status.as_str(),
                i32::from(post.deleted),
                post.summary.like_count,
                post.summary.dislike_count,
                post.summary.comment_count,
                post.summary.hot_count,
                post.summary.transfer_count,
            ],
        )?;
        versions::bump(self.conn, Table::Posts)?;
        Ok(())
    }

    fn get(&self, trx_id: &TrxId) -> Result<Option<Post>> {
        let post = self
            .conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE trx_id = ?1"),
                params![trx_id.as_str()],
                Self::parse_post,
            )
            .optional()?;
        Ok(post)
    }

    fn get_many(&self, trx_ids: &[TrxId]) -> Result<HashMap<TrxId, Post>> {
        let mut found = HashMap::with_capacity(trx_ids.len());
        for chunk in trx_ids.chunks(BATCH_CHUNK) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE trx_id IN ({})",
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(
                params_from_iter(chunk.iter().map(TrxId::as_str)),
                Self::parse_post,
            )?;
            for post in rows {
                let post = post?;
                found.insert(post.trx_id.clone(), post);
            }
        }
        Ok(found)
    }

    fn set_status(&self, trx_id: &TrxId, status: ContentStatus) -> Result<bool> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE posts SET status = ?1 WHERE trx_id = ?2 AND status IN ({})",
                predecessor_list(status)
            ),
            params![status.as_str(), trx_id.as_str()],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Posts)?;
        }
        Ok(rows > 0)
    }

    fn update_summary(&self, trx_id: &TrxId, summary: &Summary) -> Result<()> {
        self.conn.execute(
            "UPDATE posts SET like_count = ?1, dislike_count = ?2, comment_count = ?3,
                 hot_count = ?4, transfer_count = ?5
             WHERE trx_id = ?6",
            params![
                summary.like_count,
                summary.dislike_count,
                summary.comment_count,
                summary.hot_count,
                summary.transfer_count,
                trx_id.as_str(),
            ],
        )?;
        versions::bump(self.conn, Table::Posts)?;
        Ok(())
    }

    fn mark_deleted(&self, trx_id: &TrxId, publisher: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE posts SET deleted = 1 WHERE trx_id = ?1 AND publisher = ?2 AND deleted = 0",
            params![trx_id.as_str(), publisher],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Posts)?;
        }
        Ok(rows > 0)
    }

    fn list(&self, group_id: &str, limit: usize, offset: usize) -> Result<Vec<Post>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {POST_COLUMNS}
             FROM posts
             WHERE group_id = ?1 AND deleted = 0 AND status NOT IN ('fail', 'replaced')
             ORDER BY timestamp DESC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let posts = stmt
            .query_map(
                params![group_id, limit as i64, offset as i64],
                Self::parse_post,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(posts)
    }

    fn list_by_publisher(
        &self,
        group_id: &str,
        publisher: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {POST_COLUMNS}
             FROM posts
             WHERE group_id = ?1 AND publisher = ?2 AND deleted = 0
               AND status NOT IN ('fail', 'replaced')
             ORDER BY timestamp DESC
             LIMIT ?3"
        ))?;

        let posts = stmt
            .query_map(
                params![group_id, publisher, limit as i64],
                Self::parse_post,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(posts)
    }
}

/// Comment storage
pub struct CommentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> CommentRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
        Ok(Comment {
            trx_id: TrxId::new(row.get::<_, String>(0)?),
            group_id: row.get(1)?,
            object_id: TrxId::new(row.get::<_, String>(2)?),
            reply_to: row.get::<_, Option<String>>(3)?.map(TrxId::from),
            publisher: row.get(4)?,
            timestamp: row.get(5)?,
            content: row.get(6)?,
            images: json_column(row, 7)?,
            status: parse_column(row, 8)?,
            summary: parse_summary(row, 9)?,
        })
    }

    pub fn insert(&self, comment: &Comment) -> Result<()> {
        self.conn.execute(
            "INSERT INTO comments (trx_id, group_id, object_id, reply_to, publisher, timestamp,
                 content, images, status, like_count, dislike_count, comment_count, hot_count,
                 transfer_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                comment.trx_id.as_str(),
                comment.group_id,
                comment.object_id.as_str(),
                comment.reply_to.as_ref().map(TrxId::as_str),
                comment.publisher,
                comment.timestamp,
                comment.content,
                serde_json::to_string(&comment.images)?,
                comment.status.as_str(),
                comment.summary.like_count,
                comment.summary.dislike_count,
                comment.summary.comment_count,
                comment.summary.hot_count,
                comment.summary.transfer_count,
            ],
        )?;
        versions::bump(self.conn, Table::Comments)?;
        Ok(())
    }

    pub fn get(&self, trx_id: &TrxId) -> Result<Option<Comment>> {
        let comment = self
            .conn
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE trx_id = ?1"),
                params![trx_id.as_str()],
                Self::parse_comment,
            )
            .optional()?;
        Ok(comment)
    }

    pub fn get_many(&self, trx_ids: &[TrxId]) -> Result<HashMap<TrxId, Comment>> {
        let mut found = HashMap::with_capacity(trx_ids.len());
        for chunk in trx_ids.chunks(BATCH_CHUNK) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE trx_id IN ({})",
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(
                params_from_iter(chunk.iter().map(TrxId::as_str)),
                Self::parse_comment,
            )?;
            for comment in rows {
                let comment = comment?;
                found.insert(comment.trx_id.clone(), comment);
            }
        }
        Ok(found)
    }

    pub fn set_status(&self, trx_id: &TrxId, status: ContentStatus) -> Result<bool> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE comments SET status = ?1 WHERE trx_id = ?2 AND status IN ({})",
                predecessor_list(status)
            ),
            params![status.as_str(), trx_id.as_str()],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Comments)?;
        }
        Ok(rows > 0)
    }

    pub fn update_summary(&self, trx_id: &TrxId, summary: &Summary) -> Result<()> {
        self.conn.execute(
            "UPDATE comments SET like_count = ?1, dislike_count = ?2, comment_count = ?3,
                 hot_count = ?4, transfer_count = ?5
             WHERE trx_id = ?6",
            params![
                summary.like_count,
                summary.dislike_count,
                summary.comment_count,
                summary.hot_count,
                summary.transfer_count,
                trx_id.as_str(),
            ],
        )?;
        versions::bump(self.conn, Table::Comments)?;
        Ok(())
    }

    /// Comments of a post, oldest first
    pub fn list_for_post(&self, object_id: &TrxId, limit: usize) -> Result<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS}
             FROM comments
             WHERE object_id = ?1 AND status NOT IN ('fail', 'replaced')
             ORDER BY timestamp ASC
             LIMIT ?2"
        ))?;
        let comments = stmt
            .query_map(params![object_id.as_str(), limit as i64], Self::parse_comment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comments)
    }

    /// Number of stored comments on a post, replies included
    pub fn count_for_post(&self, object_id: &TrxId) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE object_id = ?1 AND status != 'fail'",
            params![object_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of stored direct replies to a comment
    pub fn count_replies(&self, trx_id: &TrxId) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE reply_to = ?1 AND status != 'fail'",
            params![trx_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn parse_summary(row: &Row<'_>, start: usize) -> rusqlite::Result<Summary> {
    Ok(Summary {
        like_count: row.get(start)?,
        dislike_count: row.get(start + 1)?,
        comment_count: row.get(start + 2)?,
        hot_count: row.get(start + 3)?,
        transfer_count: row.get(start + 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Image;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn post(trx_id: &str, timestamp: i64, status: ContentStatus) -> Post {
        Post {
            trx_id: TrxId::new(trx_id),
            group_id: "g1".into(),
            publisher: "alice".into(),
            timestamp,
            name: None,
            content: format!("post {trx_id}"),
            images: vec![Image {
                media_type: "image/png".into(),
                content: "iVBOR".into(),
            }],
            status,
            deleted: false,
            summary: Summary::default(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let repo = SqlitePostRepository::new(db.connection());

        let original = post("t1", 10, ContentStatus::Synced);
        repo.insert(&original).unwrap();

        let fetched = repo.get(&TrxId::new("t1")).unwrap().unwrap();
        assert_eq!(fetched, original);
        assert!(repo.get(&TrxId::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_trx_id_rejected() {
        let db = setup();
        let repo = SqlitePostRepository::new(db.connection());

        repo.insert(&post("t1", 10, ContentStatus::Synced)).unwrap();
        assert!(repo.insert(&post("t1", 11, ContentStatus::Synced)).is_err());
    }

    #[test]
    fn test_get_many() {
        let db = setup();
        let repo = SqlitePostRepository::new(db.connection());
        repo.insert(&post("t1", 10, ContentStatus::Synced)).unwrap();
        repo.insert(&post("t2", 11, ContentStatus::Syncing)).unwrap();

        let found = repo
            .get_many(&[TrxId::new("t1"), TrxId::new("t2"), TrxId::new("t3")])
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&TrxId::new("t2")].status, ContentStatus::Syncing);
    }

    #[test]
    fn test_set_status_only_moves_forward() {
        let db = setup();
        let repo = SqlitePostRepository::new(db.connection());
        repo.insert(&post("t1", 10, ContentStatus::Syncing)).unwrap();

        assert!(repo.set_status(&TrxId::new("t1"), ContentStatus::Synced).unwrap());
        assert!(!repo.set_status(&TrxId::new("t1"), ContentStatus::Syncing).unwrap());
        assert_eq!(
            repo.get(&TrxId::new("t1")).unwrap().unwrap().status,
            ContentStatus::Synced
        );
    }

    #[test]
    fn test_list_newest_first_and_hides_deleted() {
        let db = setup();
        let repo = SqlitePostRepository::new(db.connection());
        repo.insert(&post("t1", 10, ContentStatus::Synced)).unwrap();
        repo.insert(&post("t2", 20, ContentStatus::Synced)).unwrap();
        repo.insert(&post("t3", 30, ContentStatus::Synced)).unwrap();

        assert!(repo.mark_deleted(&TrxId::new("t3"), "alice").unwrap());
        assert!(!repo.mark_deleted(&TrxId::new("t2"), "mallory").unwrap());

        let posts = repo.list("g1", 10, 0).unwrap();
        let ids: Vec<_> = posts.iter().map(|post| post.trx_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t1"]);
    }

    #[test]
    fn test_comments_count_and_replies() {
        let db = setup();
        let repo = CommentRepository::new(db.connection());
        let base = Comment {
            trx_id: TrxId::new("c1"),
            group_id: "g1".into(),
            object_id: TrxId::new("p1"),
            reply_to: None,
            publisher: "bob".into(),
            timestamp: 1,
            content: "first".into(),
            images: Vec::new(),
            status: ContentStatus::Synced,
            summary: Summary::default(),
        };
        repo.insert(&base).unwrap();
        repo.insert(&Comment {
            trx_id: TrxId::new("c2"),
            reply_to: Some(TrxId::new("c1")),
            timestamp: 2,
            ..base.clone()
        })
        .unwrap();

        assert_eq!(repo.count_for_post(&TrxId::new("p1")).unwrap(), 2);
        assert_eq!(repo.count_replies(&TrxId::new("c1")).unwrap(), 1);
        let listed = repo.list_for_post(&TrxId::new("p1"), 10).unwrap();
        assert_eq!(listed[0].trx_id, TrxId::new("c1"));
        assert_eq!(listed[1].reply_to, Some(TrxId::new("c1")));
    }
}
