//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten();

    Ok(version.unwrap_or(0))
}

fn apply(conn: &mut Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.transaction()?;
    for stmt in statements {
        tx.execute(stmt, [])?;
    }
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: content tables
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS posts (
                trx_id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                publisher TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                name TEXT,
                content TEXT NOT NULL,
                images TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                like_count INTEGER NOT NULL DEFAULT 0,
                dislike_count INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0,
                hot_count INTEGER NOT NULL DEFAULT 0,
                transfer_count INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_posts_group_time ON posts(group_id, timestamp DESC)",
            "CREATE INDEX IF NOT EXISTS idx_posts_publisher ON posts(group_id, publisher, timestamp)",
            "CREATE TABLE IF NOT EXISTS comments (
                trx_id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                object_id TEXT NOT NULL,
                reply_to TEXT,
                publisher TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                content TEXT NOT NULL,
                images TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL,
                like_count INTEGER NOT NULL DEFAULT 0,
                dislike_count INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0,
                hot_count INTEGER NOT NULL DEFAULT 0,
                transfer_count INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_comments_object ON comments(object_id, timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_comments_reply_to ON comments(reply_to)",
            "CREATE TABLE IF NOT EXISTS profiles (
                trx_id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                publisher TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                name TEXT NOT NULL,
                avatar TEXT,
                wallet TEXT,
                status TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_profiles_publisher ON profiles(group_id, publisher)",
            "CREATE TABLE IF NOT EXISTS counters (
                trx_id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                object_id TEXT NOT NULL,
                object_type TEXT NOT NULL,
                publisher TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_counters_object ON counters(object_id, publisher)",
            "CREATE TABLE IF NOT EXISTS relations (
                trx_id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                publisher TEXT NOT NULL,
                target TEXT NOT NULL,
                kind TEXT NOT NULL,
                family TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                status TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_relations_pair ON relations(group_id, publisher, target, family)",
            "CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id TEXT NOT NULL,
                object_id TEXT NOT NULL,
                object_type TEXT NOT NULL,
                from_trx_id TEXT NOT NULL,
                from_publisher TEXT NOT NULL,
                kind TEXT NOT NULL,
                unread INTEGER NOT NULL DEFAULT 1,
                timestamp INTEGER NOT NULL,
                UNIQUE (from_trx_id, kind)
            )",
            "CREATE INDEX IF NOT EXISTS idx_notifications_group ON notifications(group_id, unread, timestamp DESC)",
        ],
    )
}

/// Migration to version 2: sync bookkeeping
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "CREATE TABLE IF NOT EXISTS cursors (
                group_id TEXT NOT NULL,
                category TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                trx_id TEXT,
                PRIMARY KEY (group_id, category)
            )",
            "CREATE TABLE IF NOT EXISTS latest_status (
                group_id TEXT PRIMARY KEY,
                latest_trx_id TEXT,
                latest_timestamp INTEGER NOT NULL DEFAULT 0,
                unread_count INTEGER NOT NULL DEFAULT 0,
                unread_likes INTEGER NOT NULL DEFAULT 0,
                unread_dislikes INTEGER NOT NULL DEFAULT 0,
                unread_comments INTEGER NOT NULL DEFAULT 0,
                unread_replies INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS node_groups (
                group_id TEXT PRIMARY KEY,
                group_name TEXT NOT NULL,
                user_pubkey TEXT NOT NULL,
                owner_pubkey TEXT NOT NULL,
                sync_state TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS producers (
                group_id TEXT NOT NULL,
                producer_pubkey TEXT NOT NULL,
                owner_pubkey TEXT NOT NULL,
                blocks_produced INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (group_id, producer_pubkey)
            )",
            "CREATE TABLE IF NOT EXISTS transfers (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                object_id TEXT NOT NULL,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                amount TEXT NOT NULL,
                asset TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_transfers_object ON transfers(object_id)",
            "CREATE TABLE IF NOT EXISTS table_versions (
                name TEXT PRIMARY KEY,
                version INTEGER NOT NULL
            )",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = setup();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v2_creates_bookkeeping_tables() {
        let mut conn = setup();
        run(&mut conn).unwrap();

        for table in ["cursors", "latest_status", "node_groups", "table_versions"] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }
}
