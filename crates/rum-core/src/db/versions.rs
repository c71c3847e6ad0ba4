//! Per-table write versions.
//!
//! Every write to a cached table bumps its version inside the same
//! transaction. Read caches compare their snapshot version against the
//! persisted one, which also catches same-row-count replacements.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Posts,
    Comments,
    Profiles,
    Counters,
    Relations,
    Notifications,
    Cursors,
    LatestStatus,
    Groups,
    Producers,
    Transfers,
}

impl Table {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Comments => "comments",
            Self::Profiles => "profiles",
            Self::Counters => "counters",
            Self::Relations => "relations",
            Self::Notifications => "notifications",
            Self::Cursors => "cursors",
            Self::LatestStatus => "latest_status",
            Self::Groups => "node_groups",
            Self::Producers => "producers",
            Self::Transfers => "transfers",
        }
    }
}

/// Increment the version of `table`, returning the new value.
pub fn bump(conn: &Connection, table: Table) -> Result<u64> {
    let version: i64 = conn.query_row(
        "INSERT INTO table_versions (name, version) VALUES (?1, 1)
         ON CONFLICT(name) DO UPDATE SET version = version + 1
         RETURNING version",
        params![table.name()],
        |row| row.get(0),
    )?;
    Ok(version.unsigned_abs())
}

/// Current version of `table`; 0 when it was never written.
pub fn current(conn: &Connection, table: Table) -> Result<u64> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM table_versions WHERE name = ?1",
            params![table.name()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0).unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn bump_increments_from_zero() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        assert_eq!(current(conn, Table::Profiles).unwrap(), 0);
        assert_eq!(bump(conn, Table::Profiles).unwrap(), 1);
        assert_eq!(bump(conn, Table::Profiles).unwrap(), 2);
        assert_eq!(current(conn, Table::Profiles).unwrap(), 2);
        assert_eq!(current(conn, Table::Relations).unwrap(), 0);
    }

    #[test]
    fn bump_rolls_back_with_transaction() {
        let mut db = Database::open_in_memory().unwrap();
        {
            let tx = db.connection_mut().transaction().unwrap();
            bump(&tx, Table::Posts).unwrap();
            // dropped without commit
        }
        assert_eq!(current(db.connection(), Table::Posts).unwrap(), 0);
    }
}
