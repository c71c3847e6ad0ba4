//! Counter (like/dislike) storage

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, Connection, Row};

use super::versions::{self, Table};
use super::{parse_column, placeholders, predecessor_list, BATCH_CHUNK};
use crate::error::Result;
use crate::models::{ContentStatus, Counter, CounterKind, Reaction, SummaryDelta, TrxId};

const COUNTER_COLUMNS: &str =
    "trx_id, group_id, object_id, object_type, publisher, timestamp, kind, status";

pub struct CounterRepository<'a> {
    conn: &'a Connection,
}

impl<'a> CounterRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_counter(row: &Row<'_>) -> rusqlite::Result<Counter> {
        Ok(Counter {
            trx_id: TrxId::new(row.get::<_, String>(0)?),
            group_id: row.get(1)?,
            object_id: TrxId::new(row.get::<_, String>(2)?),
            object_type: parse_column(row, 3)?,
            publisher: row.get(4)?,
            timestamp: row.get(5)?,
            kind: parse_column(row, 6)?,
            status: parse_column(row, 7)?,
        })
    }

    pub fn insert(&self, counter: &Counter) -> Result<()> {
        self.conn.execute(
            "INSERT INTO counters (trx_id, group_id, object_id, object_type, publisher,
                 timestamp, kind, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                counter.trx_id.as_str(),
                counter.group_id,
                counter.object_id.as_str(),
                counter.object_type.as_str(),
                counter.publisher,
                counter.timestamp,
                counter.kind.as_str(),
                counter.status.as_str(),
            ],
        )?;
        versions::bump(self.conn, Table::Counters)?;
        Ok(())
    }

    /// Store `counter` and return how it moves its publisher's reaction.
    ///
    /// Both states are replayed in timestamp order, the order
    /// [`Self::aggregate_for`] uses, so a counter delivered late lands where
    /// its timestamp puts it.
    pub fn insert_replayed(&self, counter: &Counter) -> Result<SummaryDelta> {
        let before = self.reaction(&counter.object_id, &counter.publisher)?;
        self.insert(counter)?;
        let after = self.reaction(&counter.object_id, &counter.publisher)?;
        Ok(before.delta_to(after))
    }

    pub fn get_many(&self, trx_ids: &[TrxId]) -> Result<HashMap<TrxId, Counter>> {
        let mut found = HashMap::with_capacity(trx_ids.len());
        for chunk in trx_ids.chunks(BATCH_CHUNK) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {COUNTER_COLUMNS} FROM counters WHERE trx_id IN ({})",
                placeholders(chunk.len())
            ))?;
            let rows = stmt.query_map(
                params_from_iter(chunk.iter().map(TrxId::as_str)),
                Self::parse_counter,
            )?;
            for counter in rows {
                let counter = counter?;
                found.insert(counter.trx_id.clone(), counter);
            }
        }
        Ok(found)
    }

    pub fn set_status(&self, trx_id: &TrxId, status: ContentStatus) -> Result<bool> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE counters SET status = ?1 WHERE trx_id = ?2 AND status IN ({})",
                predecessor_list(status)
            ),
            params![status.as_str(), trx_id.as_str()],
        )?;
        if rows > 0 {
            versions::bump(self.conn, Table::Counters)?;
        }
        Ok(rows > 0)
    }

    /// Reaction state of `publisher` on an object, replayed from its stored
    /// counters. Failed submissions never count.
    pub fn reaction(&self, object_id: &TrxId, publisher: &str) -> Result<Reaction> {
        let mut stmt = self.conn.prepare(
            "SELECT kind FROM counters
             WHERE object_id = ?1 AND publisher = ?2 AND status != 'fail'
             ORDER BY timestamp ASC, rowid ASC",
        )?;
        let kinds = stmt
            .query_map(params![object_id.as_str(), publisher], |row| {
                parse_column::<CounterKind>(row, 0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Reaction::replay(kinds))
    }

    /// Net like/dislike totals for an object, replayed per publisher.
    ///
    /// Used when a post or comment arrives after counters that target it.
    pub fn aggregate_for(&self, object_id: &TrxId) -> Result<SummaryDelta> {
        let mut stmt = self.conn.prepare(
            "SELECT publisher, kind FROM counters
             WHERE object_id = ?1 AND status != 'fail'
             ORDER BY timestamp ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![object_id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, parse_column::<CounterKind>(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut by_publisher: HashMap<String, Vec<CounterKind>> = HashMap::new();
        for (publisher, kind) in rows {
            by_publisher.entry(publisher).or_default().push(kind);
        }

        let mut total = SummaryDelta::default();
        for kinds in by_publisher.into_values() {
            let reaction = Reaction::replay(kinds);
            total.like += i64::from(reaction.liked);
            total.dislike += i64::from(reaction.disliked);
        }
        Ok(total)
    }

    pub fn list_for_object(&self, object_id: &TrxId) -> Result<Vec<Counter>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COUNTER_COLUMNS} FROM counters
             WHERE object_id = ?1
             ORDER BY timestamp ASC, rowid ASC"
        ))?;
        let counters = stmt
            .query_map(params![object_id.as_str()], Self::parse_counter)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ObjectType;
    use pretty_assertions::assert_eq;

    fn counter(trx_id: &str, publisher: &str, kind: CounterKind, timestamp: i64) -> Counter {
        Counter {
            trx_id: TrxId::new(trx_id),
            group_id: "g1".into(),
            object_id: TrxId::new("p1"),
            object_type: ObjectType::Post,
            publisher: publisher.into(),
            timestamp,
            kind,
            status: ContentStatus::Synced,
        }
    }

    #[test]
    fn test_reaction_is_per_publisher() {
        let db = Database::open_in_memory().unwrap();
        let repo = CounterRepository::new(db.connection());
        repo.insert(&counter("c1", "bob", CounterKind::Like, 1)).unwrap();
        repo.insert(&counter("c2", "bob", CounterKind::Like, 2)).unwrap();

        let bob = repo.reaction(&TrxId::new("p1"), "bob").unwrap();
        assert!(bob.liked);
        let none = repo.reaction(&TrxId::new("p1"), "carol").unwrap();
        assert_eq!(none, Reaction::default());
    }

    #[test]
    fn test_failed_counters_are_ignored() {
        let db = Database::open_in_memory().unwrap();
        let repo = CounterRepository::new(db.connection());
        let mut failed = counter("c1", "bob", CounterKind::Like, 1);
        failed.status = ContentStatus::Fail;
        repo.insert(&failed).unwrap();

        let reaction = repo.reaction(&TrxId::new("p1"), "bob").unwrap();
        assert!(!reaction.liked);
    }

    #[test]
    fn test_late_undo_lands_in_timestamp_order() {
        let db = Database::open_in_memory().unwrap();
        let repo = CounterRepository::new(db.connection());
        let like = repo
            .insert_replayed(&counter("c1", "bob", CounterKind::Like, 5))
            .unwrap();
        assert_eq!(like.like, 1);

        // An undo stamped before the like it would retract changes nothing
        let undo = repo
            .insert_replayed(&counter("c2", "bob", CounterKind::UndoLike, 3))
            .unwrap();
        assert!(undo.is_zero());
        assert_eq!(repo.aggregate_for(&TrxId::new("p1")).unwrap().like, 1);
    }

    #[test]
    fn test_aggregate_replays_per_publisher() {
        let db = Database::open_in_memory().unwrap();
        let repo = CounterRepository::new(db.connection());
        repo.insert(&counter("c1", "bob", CounterKind::Like, 1)).unwrap();
        repo.insert(&counter("c2", "bob", CounterKind::Like, 2)).unwrap();
        repo.insert(&counter("c3", "carol", CounterKind::Like, 3)).unwrap();
        repo.insert(&counter("c4", "carol", CounterKind::UndoLike, 4)).unwrap();
        repo.insert(&counter("c5", "dave", CounterKind::Dislike, 5)).unwrap();

        let total = repo.aggregate_for(&TrxId::new("p1")).unwrap();
        assert_eq!(total.like, 1);
        assert_eq!(total.dislike, 1);
        assert_eq!(repo.list_for_object(&TrxId::new("p1")).unwrap().len(), 5);
    }
}
