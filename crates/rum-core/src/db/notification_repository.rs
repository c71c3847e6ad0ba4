//! Notifications and per-group latest status

#![allow(clippy::cast_possible_wrap)]

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_column;
use super::versions::{self, Table};
use crate::error::Result;
use crate::models::{LatestStatus, NewNotification, Notification, NotificationKind, TrxId};

const NOTIFICATION_COLUMNS: &str =
    "id, group_id, object_id, object_type, from_trx_id, from_publisher, kind, unread, timestamp";

pub struct NotificationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> NotificationRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
        Ok(Notification {
            id: row.get(0)?,
            group_id: row.get(1)?,
            object_id: TrxId::new(row.get::<_, String>(2)?),
            object_type: parse_column(row, 3)?,
            from_trx_id: TrxId::new(row.get::<_, String>(4)?),
            from_publisher: row.get(5)?,
            kind: parse_column(row, 6)?,
            unread: row.get::<_, i32>(7)? != 0,
            timestamp: row.get(8)?,
        })
    }

    /// Insert an unread notification. Returns false when one already exists
    /// for the same source transaction and kind.
    pub fn insert(&self, notification: &NewNotification) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO notifications
                 (group_id, object_id, object_type, from_trx_id, from_publisher, kind, unread, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                notification.group_id,
                notification.object_id.as_str(),
                notification.object_type.as_str(),
                notification.from_trx_id.as_str(),
                notification.from_publisher,
                notification.kind.as_str(),
                notification.timestamp,
            ],
        )?;
        if rows == 0 {
            return Ok(false);
        }
        versions::bump(self.conn, Table::Notifications)?;
        self.bump_unread_kind(&notification.group_id, notification.kind)?;
        Ok(true)
    }

    /// Notifications of a group, newest first
    pub fn list(&self, group_id: &str, unread_only: bool, limit: usize) -> Result<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE group_id = ?1 AND (?2 = 0 OR unread = 1)
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3"
        ))?;
        let notifications = stmt
            .query_map(
                params![group_id, i32::from(unread_only), limit as i64],
                Self::parse_notification,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }

    /// Mark every notification of a group read and reset its unread counters
    pub fn mark_read(&self, group_id: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE notifications SET unread = 0 WHERE group_id = ?1 AND unread = 1",
            params![group_id],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Notifications)?;
        }
        self.conn.execute(
            "UPDATE latest_status
             SET unread_likes = 0, unread_dislikes = 0, unread_comments = 0, unread_replies = 0
             WHERE group_id = ?1",
            params![group_id],
        )?;
        versions::bump(self.conn, Table::LatestStatus)?;
        Ok(rows)
    }

    pub fn latest_status(&self, group_id: &str) -> Result<LatestStatus> {
        let status = self
            .conn
            .query_row(
                "SELECT group_id, latest_trx_id, latest_timestamp, unread_count, unread_likes,
                        unread_dislikes, unread_comments, unread_replies
                 FROM latest_status WHERE group_id = ?1",
                params![group_id],
                |row| {
                    Ok(LatestStatus {
                        group_id: row.get(0)?,
                        latest_trx_id: row.get::<_, Option<String>>(1)?.map(TrxId::from),
                        latest_timestamp: row.get(2)?,
                        unread_count: row.get(3)?,
                        unread_likes: row.get(4)?,
                        unread_dislikes: row.get(5)?,
                        unread_comments: row.get(6)?,
                        unread_replies: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(status.unwrap_or_else(|| LatestStatus {
            group_id: group_id.to_string(),
            ..LatestStatus::default()
        }))
    }

    /// Record newly merged posts from other publishers
    pub fn record_unread_posts(
        &self,
        group_id: &str,
        count: i64,
        latest_trx_id: &TrxId,
        latest_timestamp: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO latest_status (group_id, latest_trx_id, latest_timestamp, unread_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(group_id) DO UPDATE SET
                 unread_count = unread_count + excluded.unread_count,
                 latest_trx_id = CASE WHEN excluded.latest_timestamp >= latest_status.latest_timestamp
                     THEN excluded.latest_trx_id ELSE latest_status.latest_trx_id END,
                 latest_timestamp = MAX(latest_status.latest_timestamp, excluded.latest_timestamp)",
            params![group_id, latest_trx_id.as_str(), latest_timestamp, count],
        )?;
        versions::bump(self.conn, Table::LatestStatus)?;
        Ok(())
    }

    /// Reset the unread post counter once the feed was viewed
    pub fn clear_unread_posts(&self, group_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE latest_status SET unread_count = 0 WHERE group_id = ?1",
            params![group_id],
        )?;
        versions::bump(self.conn, Table::LatestStatus)?;
        Ok(())
    }

    fn bump_unread_kind(&self, group_id: &str, kind: NotificationKind) -> Result<()> {
        let column = match kind {
            NotificationKind::Like => "unread_likes",
            NotificationKind::Dislike => "unread_dislikes",
            NotificationKind::Comment => "unread_comments",
            NotificationKind::Reply => "unread_replies",
        };
        self.conn.execute(
            &format!(
                "INSERT INTO latest_status (group_id, {column}) VALUES (?1, 1)
                 ON CONFLICT(group_id) DO UPDATE SET {column} = {column} + 1"
            ),
            params![group_id],
        )?;
        versions::bump(self.conn, Table::LatestStatus)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ObjectType;
    use pretty_assertions::assert_eq;

    fn like(from: &str) -> NewNotification {
        NewNotification {
            group_id: "g1".into(),
            object_id: TrxId::new("p1"),
            object_type: ObjectType::Post,
            from_trx_id: TrxId::new(from),
            from_publisher: "bob".into(),
            kind: NotificationKind::Like,
            timestamp: 5,
        }
    }

    #[test]
    fn test_insert_is_unique_per_source_and_kind() {
        let db = Database::open_in_memory().unwrap();
        let repo = NotificationRepository::new(db.connection());

        assert!(repo.insert(&like("c1")).unwrap());
        assert!(!repo.insert(&like("c1")).unwrap());

        let status = repo.latest_status("g1").unwrap();
        assert_eq!(status.unread_likes, 1);
        assert_eq!(status.unread_notifications(), 1);
    }

    #[test]
    fn test_mark_read_resets_counters() {
        let db = Database::open_in_memory().unwrap();
        let repo = NotificationRepository::new(db.connection());
        repo.insert(&like("c1")).unwrap();
        repo.insert(&like("c2")).unwrap();

        assert_eq!(repo.list("g1", true, 10).unwrap().len(), 2);
        assert_eq!(repo.mark_read("g1").unwrap(), 2);
        assert!(repo.list("g1", true, 10).unwrap().is_empty());
        assert_eq!(repo.list("g1", false, 10).unwrap().len(), 2);
        assert_eq!(repo.latest_status("g1").unwrap().unread_notifications(), 0);
    }

    #[test]
    fn test_unread_posts_track_latest() {
        let db = Database::open_in_memory().unwrap();
        let repo = NotificationRepository::new(db.connection());

        repo.record_unread_posts("g1", 2, &TrxId::new("t2"), 20).unwrap();
        repo.record_unread_posts("g1", 1, &TrxId::new("t1"), 10).unwrap();

        let status = repo.latest_status("g1").unwrap();
        assert_eq!(status.unread_count, 3);
        assert_eq!(status.latest_trx_id, Some(TrxId::new("t2")));
        assert_eq!(status.latest_timestamp, 20);

        repo.clear_unread_posts("g1").unwrap();
        assert_eq!(repo.latest_status("g1").unwrap().unread_count, 0);
        assert_eq!(repo.latest_status("g9").unwrap().group_id, "g9");
    }
}
