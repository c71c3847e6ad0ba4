//! In-memory read caches over store tables
//!
//! A [`ReadCache`] keeps a sorted copy of one table's live rows. Every read
//! compares the table's persisted version with the version the copy was
//! built from and rebuilds when they differ.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::db::versions::{self, Table};
use crate::db::{ProfileRepository, RelationRepository};
use crate::error::Result;
use crate::models::{Profile, Relation, RelationKind};

/// One component of a cache key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Text(String),
    Int(i64),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

type Loader<T> = fn(&Connection) -> Result<Vec<T>>;
type KeyFn<T> = fn(&T) -> Vec<KeyPart>;

struct Snapshot<T> {
    version: u64,
    entries: Vec<(Vec<KeyPart>, T)>,
}

pub struct ReadCache<T> {
    table: Table,
    load: Loader<T>,
    key: KeyFn<T>,
    snapshot: Mutex<Option<Snapshot<T>>>,
}

impl<T: Clone> ReadCache<T> {
    /// `key` orders rows most selective component first
    pub fn new(table: Table, load: Loader<T>, key: KeyFn<T>) -> Self {
        Self {
            table,
            load,
            key,
            snapshot: Mutex::new(None),
        }
    }

    pub const fn table(&self) -> Table {
        self.table
    }

    /// Drop the cached rows. The next read rebuilds.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    /// Every row whose key starts with `prefix`, in key order. A full key
    /// yields at most one row.
    pub fn prefix(&self, conn: &Connection, prefix: &[KeyPart]) -> Result<Vec<T>> {
        let guard = self.fresh(conn)?;
        let entries = guard.as_ref().map_or(&[][..], |snapshot| &snapshot.entries[..]);
        let start = entries.partition_point(|(key, _)| key.as_slice() < prefix);
        Ok(entries[start..]
            .iter()
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect())
    }

    /// Number of cached rows after bringing the cache up to date
    pub fn len(&self, conn: &Connection) -> Result<usize> {
        let guard = self.fresh(conn)?;
        Ok(guard.as_ref().map_or(0, |snapshot| snapshot.entries.len()))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Snapshot<T>>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(&self, conn: &Connection) -> Result<MutexGuard<'_, Option<Snapshot<T>>>> {
        let version = versions::current(conn, self.table)?;
        let mut guard = self.lock();
        let stale = guard
            .as_ref()
            .is_none_or(|snapshot| snapshot.version != version);
        if stale {
            let mut entries: Vec<_> = (self.load)(conn)?
                .into_iter()
                .map(|value| ((self.key)(&value), value))
                .collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            tracing::trace!(
                table = self.table.name(),
                version,
                rows = entries.len(),
                "Rebuilt read cache"
            );
            *guard = Some(Snapshot { version, entries });
        }
        Ok(guard)
    }
}

/// Caches shared by the sync tasks and the read side
pub struct Caches {
    pub profiles: ReadCache<Profile>,
    pub relations: ReadCache<Relation>,
}

impl Default for Caches {
    fn default() -> Self {
        Self::new()
    }
}

impl Caches {
    pub fn new() -> Self {
        Self {
            profiles: ReadCache::new(
                Table::Profiles,
                |conn| ProfileRepository::new(conn).list_live(),
                |profile| {
                    vec![
                        profile.group_id.as_str().into(),
                        profile.publisher.as_str().into(),
                        profile.timestamp.into(),
                        profile.trx_id.as_str().into(),
                    ]
                },
            ),
            relations: ReadCache::new(
                Table::Relations,
                |conn| RelationRepository::new(conn).list_live(),
                |relation| {
                    vec![
                        relation.group_id.as_str().into(),
                        relation.publisher.as_str().into(),
                        relation.target.as_str().into(),
                        relation.timestamp.into(),
                        relation.trx_id.as_str().into(),
                    ]
                },
            ),
        }
    }

    /// Invalidate every cache backed by one of `tables`
    pub fn invalidate_tables(&self, tables: &[Table]) {
        if tables.contains(&self.profiles.table()) {
            self.profiles.invalidate();
        }
        if tables.contains(&self.relations.table()) {
            self.relations.invalidate();
        }
    }

    pub fn invalidate_all(&self) {
        self.profiles.invalidate();
        self.relations.invalidate();
    }

    /// Latest live profile of a publisher in a group
    pub fn latest_profile(
        &self,
        conn: &Connection,
        group_id: &str,
        publisher: &str,
    ) -> Result<Option<Profile>> {
        let profiles = self
            .profiles
            .prefix(conn, &[group_id.into(), publisher.into()])?;
        Ok(profiles.into_iter().last())
    }

    /// Follows and blocks `publisher` currently has in effect, in target
    /// order. The newest live record of each target and family decides.
    pub fn relations_of(
        &self,
        conn: &Connection,
        group_id: &str,
        publisher: &str,
    ) -> Result<Vec<Relation>> {
        let mut latest = BTreeMap::new();
        for relation in self
            .relations
            .prefix(conn, &[group_id.into(), publisher.into()])?
        {
            latest.insert((relation.target.clone(), relation.kind.family()), relation);
        }
        Ok(latest
            .into_values()
            .filter(|relation| matches!(relation.kind, RelationKind::Follow | RelationKind::Block))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, ProfileRepository};
    use crate::models::{ContentStatus, TrxId};
    use pretty_assertions::assert_eq;

    fn profile(trx_id: &str, publisher: &str, timestamp: i64) -> Profile {
        Profile {
            trx_id: TrxId::new(trx_id),
            group_id: "g1".into(),
            publisher: publisher.into(),
            timestamp,
            name: format!("{publisher}-{timestamp}"),
            avatar: None,
            wallet: None,
            status: ContentStatus::Synced,
        }
    }

    #[test]
    fn test_prefix_matches_store_filter() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let repo = ProfileRepository::new(conn);
        for (trx, publisher, ts) in [("a", "alice", 3), ("b", "bob", 1), ("c", "alice", 1)] {
            repo.insert(&profile(trx, publisher, ts)).unwrap();
        }
        let caches = Caches::new();
        caches.invalidate_all();

        let cached = caches
            .profiles
            .prefix(conn, &["g1".into(), "alice".into()])
            .unwrap();
        let mut direct: Vec<_> = repo
            .list_live()
            .unwrap()
            .into_iter()
            .filter(|p| p.group_id == "g1" && p.publisher == "alice")
            .collect();
        direct.sort_by_key(|p| p.timestamp);
        assert_eq!(cached, direct);
    }

    #[test]
    fn test_rebuilds_after_same_count_edit() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let repo = ProfileRepository::new(conn);
        repo.insert(&profile("a", "alice", 1)).unwrap();
        let caches = Caches::new();
        assert_eq!(caches.profiles.len(conn).unwrap(), 1);

        // Replace then insert keeps the live row count at one
        repo.insert(&profile("b", "alice", 2)).unwrap();
        repo.replace_previous("g1", "alice", &TrxId::new("b")).unwrap();

        let latest = caches.latest_profile(conn, "g1", "alice").unwrap().unwrap();
        assert_eq!(latest.trx_id, TrxId::new("b"));
        assert_eq!(caches.profiles.len(conn).unwrap(), 1);
    }

    #[test]
    fn test_full_key_prefix_is_a_point_lookup() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let repo = ProfileRepository::new(conn);
        repo.insert(&profile("a", "alice", 7)).unwrap();
        repo.insert(&profile("b", "alice", 9)).unwrap();
        let caches = Caches::new();

        let key = [
            KeyPart::from("g1"),
            KeyPart::from("alice"),
            KeyPart::from(7),
            KeyPart::from("a"),
        ];
        let exact = caches.profiles.prefix(conn, &key).unwrap();
        assert_eq!(exact, vec![profile("a", "alice", 7)]);
        assert_eq!(caches.profiles.prefix(conn, &key[..2]).unwrap().len(), 2);
        assert!(caches
            .profiles
            .prefix(conn, &[KeyPart::from("g1"), KeyPart::from("alice"), KeyPart::from(8)])
            .unwrap()
            .is_empty());
    }

    fn relation(trx_id: &str, target: &str, kind: RelationKind, timestamp: i64) -> Relation {
        Relation {
            trx_id: TrxId::new(trx_id),
            group_id: "g1".into(),
            publisher: "alice".into(),
            target: target.into(),
            kind,
            timestamp,
            status: ContentStatus::Synced,
        }
    }

    #[test]
    fn test_relations_follow_the_newest_record_per_family() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let repo = RelationRepository::new(conn);
        let caches = Caches::new();
        repo.insert(&relation("r1", "bob", RelationKind::Follow, 1)).unwrap();
        repo.insert(&relation("r2", "carol", RelationKind::Follow, 2)).unwrap();
        repo.insert(&relation("r3", "carol", RelationKind::Block, 3)).unwrap();

        let names = |relations: Vec<Relation>| {
            relations
                .into_iter()
                .map(|r| (r.target, r.kind))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            names(caches.relations_of(conn, "g1", "alice").unwrap()),
            vec![
                ("bob".to_string(), RelationKind::Follow),
                ("carol".to_string(), RelationKind::Block),
                ("carol".to_string(), RelationKind::Follow),
            ]
        );

        let unfollow = relation("r4", "bob", RelationKind::Unfollow, 4);
        repo.insert(&unfollow).unwrap();
        repo.replace_previous(&unfollow).unwrap();

        assert_eq!(
            names(caches.relations_of(conn, "g1", "alice").unwrap()),
            vec![
                ("carol".to_string(), RelationKind::Block),
                ("carol".to_string(), RelationKind::Follow),
            ]
        );
        assert!(caches.relations_of(conn, "g1", "bob").unwrap().is_empty());
    }
}
