//! Error types for rum-core

use thiserror::Error;

use crate::node::NodeError;

/// Result type alias using rum-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rum-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote node request failed
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
