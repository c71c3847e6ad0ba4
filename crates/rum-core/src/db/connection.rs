//! Database connection management

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;

use super::migrations;
use super::versions::{self, Table};

/// Tables holding synced data. `clear_all` empties every one of them.
const DATA_TABLES: [Table; 11] = [
    Table::Posts,
    Table::Comments,
    Table::Profiles,
    Table::Counters,
    Table::Relations,
    Table::Notifications,
    Table::Cursors,
    Table::LatestStatus,
    Table::Groups,
    Table::Producers,
    Table::Transfers,
];

/// Database wrapper for the local `SQLite` store
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let mut database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for optimal performance
    fn configure(&self) -> Result<()> {
        // journal_mode returns a row, and in-memory databases refuse WAL
        self.conn
            .query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))
            .ok();
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = 10000;",
        )?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference, needed to open transactions
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Drop all locally synced data. Schema and table versions survive so
    /// read caches notice the change.
    pub fn clear_all(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for table in DATA_TABLES {
            tx.execute(&format!("DELETE FROM {}", table.name()), [])?;
            versions::bump(&tx, table)?;
        }
        tx.commit()?;
        tracing::info!("Cleared all local data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let one: i64 = db
            .connection()
            .query_row("SELECT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(one, 1);
    }

    #[test]
    fn test_open_file_reopens_existing_schema() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("rum.db");

        {
            let db = Database::open(&path).unwrap();
            db.connection()
                .execute(
                    "INSERT INTO node_groups (group_id, group_name, user_pubkey, owner_pubkey, sync_state)
                     VALUES ('g1', 'town', 'me', 'owner', 'SYNCED')",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM node_groups", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_clear_all_empties_tables_and_bumps_versions() {
        let mut db = Database::open_in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO node_groups (group_id, group_name, user_pubkey, owner_pubkey, sync_state)
                 VALUES ('g1', 'town', 'me', 'owner', 'SYNCED')",
                [],
            )
            .unwrap();
        let before = versions::current(db.connection(), Table::Profiles).unwrap();

        db.clear_all().unwrap();

        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM node_groups", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(versions::current(db.connection(), Table::Profiles).unwrap() > before);
    }
}
