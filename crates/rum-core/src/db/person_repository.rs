//! Profile and relation storage
//!
//! Both tables keep one current record per entity. A newly synced record
//! marks the previously synced one for the same entity as `replaced`.

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::versions::{self, Table};
use super::{optional_json_column, parse_column, placeholders, predecessor_list, BATCH_CHUNK};
use crate::error::Result;
use crate::models::{ContentStatus, Profile, Relation, TrxId};

const PROFILE_COLUMNS: &str = "trx_id, group_id, publisher, timestamp, name, avatar, wallet, status";

const RELATION_COLUMNS: &str = "trx_id, group_id, publisher, target, kind, timestamp, status";

pub struct ProfileRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ProfileRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
        Ok(Profile {
            trx_id: TrxId::new(row.get::<_, String>(0)?),
            group_id: row.get(1)?,
            publisher: row.get(2)?,
            timestamp: row.get(3)?,
            name: row.get(4)?,
            avatar: optional_json_column(row, 5)?,
            wallet: row.get(6)?,
            status: parse_column(row, 7)?,
        })
    }

    pub fn insert(&self, profile: &Profile) -> Result<()> {
        let avatar = profile
            .avatar
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO profiles (trx_id, group_id, publisher, timestamp, name, avatar, wallet, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                profile.trx_id.as_str(),
                profile.group_id,
                profile.publisher,
                profile.timestamp,
                profile.name,
                avatar,
                profile.wallet,
                profile.status.as_str(),
            ],
        )?;
        versions::bump(self.conn, Table::Profiles)?;
        Ok(())
    }

    pub fn get_many(&self, trx_ids: &[TrxId]) -> Result<HashMap<TrxId, Profile>> {
        let mut found = HashMap::with_capacity(trx_ids.len());
        for chunk in trx_ids.chunks(BATCH_CHUNK) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles WHERE trx_id IN ({})",
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(
                params_from_iter(chunk.iter().map(TrxId::as_str)),
                Self::parse_profile,
            )?;
            for profile in rows {
                let profile = profile?;
                found.insert(profile.trx_id.clone(), profile);
            }
        }
        Ok(found)
    }

    pub fn set_status(&self, trx_id: &TrxId, status: ContentStatus) -> Result<bool> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE profiles SET status = ?1 WHERE trx_id = ?2 AND status IN ({})",
                predecessor_list(status)
            ),
            params![status.as_str(), trx_id.as_str()],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Profiles)?;
        }
        Ok(rows > 0)
    }

    /// Mark every other synced profile of `publisher` as replaced
    pub fn replace_previous(&self, group_id: &str, publisher: &str, keep: &TrxId) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE profiles SET status = 'replaced'
             WHERE group_id = ?1 AND publisher = ?2 AND trx_id != ?3 AND status = 'synced'",
            params![group_id, publisher, keep.as_str()],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Profiles)?;
        }
        Ok(rows)
    }

    /// Most recent live profile of a publisher, pending submissions included
    pub fn latest_for_publisher(&self, group_id: &str, publisher: &str) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                &format!(
                    "SELECT {PROFILE_COLUMNS} FROM profiles
                     WHERE group_id = ?1 AND publisher = ?2
                       AND status NOT IN ('fail', 'replaced')
                     ORDER BY timestamp DESC, rowid DESC
                     LIMIT 1"
                ),
                params![group_id, publisher],
                Self::parse_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// Every live profile, oldest first
    pub fn list_live(&self) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             WHERE status NOT IN ('fail', 'replaced')
             ORDER BY timestamp ASC, rowid ASC"
        ))?;
        let profiles = stmt
            .query_map([], Self::parse_profile)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(profiles)
    }
}

pub struct RelationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> RelationRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_relation(row: &Row<'_>) -> rusqlite::Result<Relation> {
        Ok(Relation {
            trx_id: TrxId::new(row.get::<_, String>(0)?),
            group_id: row.get(1)?,
            publisher: row.get(2)?,
            target: row.get(3)?,
            kind: parse_column(row, 4)?,
            timestamp: row.get(5)?,
            status: parse_column(row, 6)?,
        })
    }

    pub fn insert(&self, relation: &Relation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO relations (trx_id, group_id, publisher, target, kind, family, timestamp, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                relation.trx_id.as_str(),
                relation.group_id,
                relation.publisher,
                relation.target,
                relation.kind.as_str(),
                relation.kind.family(),
                relation.timestamp,
                relation.status.as_str(),
            ],
        )?;
        versions::bump(self.conn, Table::Relations)?;
        Ok(())
    }

    pub fn get_many(&self, trx_ids: &[TrxId]) -> Result<HashMap<TrxId, Relation>> {
        let mut found = HashMap::with_capacity(trx_ids.len());
        for chunk in trx_ids.chunks(BATCH_CHUNK) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {RELATION_COLUMNS} FROM relations WHERE trx_id IN ({})",
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(
                params_from_iter(chunk.iter().map(TrxId::as_str)),
                Self::parse_relation,
            )?;
            for relation in rows {
                let relation = relation?;
                found.insert(relation.trx_id.clone(), relation);
            }
        }
        Ok(found)
    }

    pub fn set_status(&self, trx_id: &TrxId, status: ContentStatus) -> Result<bool> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE relations SET status = ?1 WHERE trx_id = ?2 AND status IN ({})",
                predecessor_list(status)
            ),
            params![status.as_str(), trx_id.as_str()],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Relations)?;
        }
        Ok(rows > 0)
    }

    /// Mark the other synced relations between the same pair, in the same
    /// family, as replaced
    pub fn replace_previous(&self, relation: &Relation) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE relations SET status = 'replaced'
             WHERE group_id = ?1 AND publisher = ?2 AND target = ?3 AND family = ?4
               AND trx_id != ?5 AND status = 'synced'",
            params![
                relation.group_id,
                relation.publisher,
                relation.target,
                relation.kind.family(),
                relation.trx_id.as_str(),
            ],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Relations)?;
        }
        Ok(rows)
    }

    /// Every live relation, oldest first
    pub fn list_live(&self) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RELATION_COLUMNS} FROM relations
             WHERE status NOT IN ('fail', 'replaced')
             ORDER BY timestamp ASC, rowid ASC"
        ))?;
        let relations = stmt
            .query_map([], Self::parse_relation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Image, RelationKind};
    use pretty_assertions::assert_eq;

    fn profile(trx_id: &str, name: &str, timestamp: i64, status: ContentStatus) -> Profile {
        Profile {
            trx_id: TrxId::new(trx_id),
            group_id: "g1".into(),
            publisher: "alice".into(),
            timestamp,
            name: name.into(),
            avatar: Some(Image {
                media_type: "image/png".into(),
                content: "AAAA".into(),
            }),
            wallet: None,
            status,
        }
    }

    #[test]
    fn test_profile_replace_previous() {
        let db = Database::open_in_memory().unwrap();
        let repo = ProfileRepository::new(db.connection());
        repo.insert(&profile("p1", "Alice", 1, ContentStatus::Synced)).unwrap();
        repo.insert(&profile("p2", "Alice B", 2, ContentStatus::Synced)).unwrap();

        assert_eq!(repo.replace_previous("g1", "alice", &TrxId::new("p2")).unwrap(), 1);

        let latest = repo.latest_for_publisher("g1", "alice").unwrap().unwrap();
        assert_eq!(latest.name, "Alice B");
        assert!(latest.avatar.is_some());

        let all = repo
            .get_many(&[TrxId::new("p1"), TrxId::new("p2")])
            .unwrap();
        assert_eq!(all[&TrxId::new("p1")].status, ContentStatus::Replaced);
        assert_eq!(repo.list_live().unwrap().len(), 1);
    }

    #[test]
    fn test_relation_replacement_stays_within_family() {
        let db = Database::open_in_memory().unwrap();
        let repo = RelationRepository::new(db.connection());
        let follow = Relation {
            trx_id: TrxId::new("r1"),
            group_id: "g1".into(),
            publisher: "alice".into(),
            target: "bob".into(),
            kind: RelationKind::Follow,
            timestamp: 1,
            status: ContentStatus::Synced,
        };
        let block = Relation {
            trx_id: TrxId::new("r2"),
            kind: RelationKind::Block,
            timestamp: 2,
            ..follow.clone()
        };
        let unfollow = Relation {
            trx_id: TrxId::new("r3"),
            kind: RelationKind::Unfollow,
            timestamp: 3,
            ..follow.clone()
        };
        repo.insert(&follow).unwrap();
        repo.insert(&block).unwrap();
        repo.insert(&unfollow).unwrap();

        assert_eq!(repo.replace_previous(&unfollow).unwrap(), 1);

        let live: Vec<_> = repo
            .list_live()
            .unwrap()
            .into_iter()
            .map(|relation| relation.kind)
            .collect();
        assert_eq!(live, vec![RelationKind::Block, RelationKind::Unfollow]);
    }
}
