//! Local store for rum-sync

mod connection;
mod content_repository;
mod counter_repository;
mod migrations;
mod notification_repository;
mod person_repository;
mod sync_repository;
pub mod versions;

pub use connection::Database;
pub use content_repository::{CommentRepository, PostRepository, SqlitePostRepository};
pub use counter_repository::CounterRepository;
pub use notification_repository::NotificationRepository;
pub use person_repository::{ProfileRepository, RelationRepository};
pub use sync_repository::SyncRepository;
pub use versions::Table;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;

use crate::models::ContentStatus;

/// `?, ?, ?` for `n` bound parameters
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// `'a', 'b'` literal list of the statuses allowed to precede `next`
pub(crate) fn predecessor_list(next: ContentStatus) -> String {
    next.predecessors()
        .into_iter()
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a text column and parse it with `FromStr`
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|error: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, error.into()))
}

/// Read a JSON text column
pub(crate) fn json_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, error.into()))
}

/// Read a nullable JSON text column
pub(crate) fn optional_json_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, error.into())
        })
    })
    .transpose()
}

/// Maximum bound parameters per batched `IN (...)` query
pub(crate) const BATCH_CHUNK: usize = 400;
