//! Cursors, groups, producers and transfers

#![allow(clippy::cast_possible_wrap)]

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_column;
use super::versions::{self, Table};
use crate::error::Result;
use crate::models::{Category, Cursor, Group, Producer, Transfer, TrxId};

pub struct SyncRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SyncRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stored cursor, or the start of the stream
    pub fn cursor(&self, group_id: &str, category: Category) -> Result<Cursor> {
        let cursor = self
            .conn
            .query_row(
                "SELECT timestamp, trx_id FROM cursors WHERE group_id = ?1 AND category = ?2",
                params![group_id, category.as_str()],
                |row| {
                    Ok(Cursor {
                        timestamp: row.get(0)?,
                        trx_id: row.get::<_, Option<String>>(1)?.map(TrxId::from),
                    })
                },
            )
            .optional()?;
        Ok(cursor.unwrap_or_default())
    }

    /// Persist a cursor. A cursor older than the stored one is ignored.
    pub fn save_cursor(&self, group_id: &str, category: Category, cursor: &Cursor) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT INTO cursors (group_id, category, timestamp, trx_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(group_id, category) DO UPDATE SET
                 timestamp = excluded.timestamp,
                 trx_id = excluded.trx_id
             WHERE excluded.timestamp >= cursors.timestamp",
            params![
                group_id,
                category.as_str(),
                cursor.timestamp,
                cursor.trx_id.as_ref().map(TrxId::as_str),
            ],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Cursors)?;
        }
        Ok(rows > 0)
    }

    fn parse_group(row: &Row<'_>) -> rusqlite::Result<Group> {
        Ok(Group {
            group_id: row.get(0)?,
            group_name: row.get(1)?,
            user_pubkey: row.get(2)?,
            owner_pubkey: row.get(3)?,
            sync_state: parse_column(row, 4)?,
        })
    }

    pub fn upsert_group(&self, group: &Group) -> Result<()> {
        self.conn.execute(
            "INSERT INTO node_groups (group_id, group_name, user_pubkey, owner_pubkey, sync_state)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(group_id) DO UPDATE SET
                 group_name = excluded.group_name,
                 user_pubkey = excluded.user_pubkey,
                 owner_pubkey = excluded.owner_pubkey,
                 sync_state = excluded.sync_state",
            params![
                group.group_id,
                group.group_name,
                group.user_pubkey,
                group.owner_pubkey,
                group.sync_state.as_str(),
            ],
        )?;
        versions::bump(self.conn, Table::Groups)?;
        Ok(())
    }

    /// Drop groups the node no longer reports
    pub fn retain_groups(&self, group_ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for group in self.list_groups()? {
            if !group_ids.contains(&group.group_id) {
                removed += self.conn.execute(
                    "DELETE FROM node_groups WHERE group_id = ?1",
                    params![group.group_id],
                )?;
            }
        }
        if removed > 0 {
            versions::bump(self.conn, Table::Groups)?;
        }
        Ok(removed)
    }

    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_id, group_name, user_pubkey, owner_pubkey, sync_state
             FROM node_groups ORDER BY group_name ASC, group_id ASC",
        )?;
        let groups = stmt
            .query_map([], Self::parse_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    pub fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        let group = self
            .conn
            .query_row(
                "SELECT group_id, group_name, user_pubkey, owner_pubkey, sync_state
                 FROM node_groups WHERE group_id = ?1",
                params![group_id],
                Self::parse_group,
            )
            .optional()?;
        Ok(group)
    }

    /// Replace the producer list of a group
    pub fn replace_producers(&self, group_id: &str, producers: &[Producer]) -> Result<()> {
        self.conn
            .execute("DELETE FROM producers WHERE group_id = ?1", params![group_id])?;
        for producer in producers {
            self.conn.execute(
                "INSERT OR REPLACE INTO producers
                     (group_id, producer_pubkey, owner_pubkey, blocks_produced)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    group_id,
                    producer.producer_pubkey,
                    producer.owner_pubkey,
                    producer.blocks_produced,
                ],
            )?;
        }
        versions::bump(self.conn, Table::Producers)?;
        Ok(())
    }

    pub fn list_producers(&self, group_id: &str) -> Result<Vec<Producer>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_id, producer_pubkey, owner_pubkey, blocks_produced
             FROM producers WHERE group_id = ?1 ORDER BY producer_pubkey",
        )?;
        let producers = stmt
            .query_map(params![group_id], |row| {
                Ok(Producer {
                    group_id: row.get(0)?,
                    producer_pubkey: row.get(1)?,
                    owner_pubkey: row.get(2)?,
                    blocks_produced: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(producers)
    }

    /// Insert a transfer. Returns false when it was already stored.
    pub fn insert_transfer(&self, transfer: &Transfer) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO transfers
                 (id, group_id, object_id, sender, recipient, amount, asset, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                transfer.id,
                transfer.group_id,
                transfer.object_id.as_str(),
                transfer.sender,
                transfer.recipient,
                transfer.amount,
                transfer.asset,
                transfer.timestamp,
            ],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Transfers)?;
        }
        Ok(rows > 0)
    }

    pub fn count_transfers(&self, object_id: &TrxId) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM transfers WHERE object_id = ?1",
            params![object_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn list_transfers(&self, group_id: &str, limit: usize) -> Result<Vec<Transfer>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, group_id, object_id, sender, recipient, amount, asset, timestamp
             FROM transfers WHERE group_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let transfers = stmt
            .query_map(params![group_id, limit as i64], |row| {
                Ok(Transfer {
                    id: row.get(0)?,
                    group_id: row.get(1)?,
                    object_id: TrxId::new(row.get::<_, String>(2)?),
                    sender: row.get(3)?,
                    recipient: row.get(4)?,
                    amount: row.get(5)?,
                    asset: row.get(6)?,
                    timestamp: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::GroupSyncState;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cursor_defaults_to_start() {
        let db = Database::open_in_memory().unwrap();
        let repo = SyncRepository::new(db.connection());
        assert!(repo.cursor("g1", Category::Content).unwrap().is_start());
    }

    #[test]
    fn test_cursor_never_regresses() {
        let db = Database::open_in_memory().unwrap();
        let repo = SyncRepository::new(db.connection());
        let newer = Cursor {
            timestamp: 20,
            trx_id: Some(TrxId::new("t2")),
        };
        let older = Cursor {
            timestamp: 10,
            trx_id: Some(TrxId::new("t1")),
        };

        assert!(repo.save_cursor("g1", Category::Content, &newer).unwrap());
        assert!(!repo.save_cursor("g1", Category::Content, &older).unwrap());
        assert_eq!(repo.cursor("g1", Category::Content).unwrap(), newer);
        assert!(repo.cursor("g1", Category::Transfers).unwrap().is_start());
    }

    #[test]
    fn test_groups_upsert_and_retain() {
        let db = Database::open_in_memory().unwrap();
        let repo = SyncRepository::new(db.connection());
        let mut group = Group {
            group_id: "g1".into(),
            group_name: "Forum".into(),
            user_pubkey: "me".into(),
            owner_pubkey: "owner".into(),
            sync_state: GroupSyncState::Syncing,
        };
        repo.upsert_group(&group).unwrap();
        group.sync_state = GroupSyncState::Synced;
        repo.upsert_group(&group).unwrap();
        repo.upsert_group(&Group {
            group_id: "g2".into(),
            group_name: "Old".into(),
            ..group.clone()
        })
        .unwrap();

        assert_eq!(repo.retain_groups(&["g1".to_string()]).unwrap(), 1);
        assert_eq!(repo.list_groups().unwrap(), vec![group.clone()]);
        assert_eq!(repo.get_group("g1").unwrap(), Some(group));
    }

    #[test]
    fn test_transfers_insert_once() {
        let db = Database::open_in_memory().unwrap();
        let repo = SyncRepository::new(db.connection());
        let transfer = Transfer {
            id: "x1".into(),
            group_id: "g1".into(),
            object_id: TrxId::new("p1"),
            sender: "bob".into(),
            recipient: "alice".into(),
            amount: "1.5".into(),
            asset: "RUM".into(),
            timestamp: 3,
        };
        assert!(repo.insert_transfer(&transfer).unwrap());
        assert!(!repo.insert_transfer(&transfer).unwrap());
        assert_eq!(repo.count_transfers(&TrxId::new("p1")).unwrap(), 1);
        assert_eq!(repo.list_transfers("g1", 10).unwrap(), vec![transfer]);
    }
}
