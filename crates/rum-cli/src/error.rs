use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] rum_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No content provided")]
    EmptyContent,
    #[error("Trx id cannot be empty")]
    EmptyTrxId,
    #[error("Group not found: {0}")]
    GroupNotFound(String),
    #[error("Refusing to clear local data without --yes")]
    ConfirmationRequired,
}

impl From<rum_core::node::NodeError> for CliError {
    fn from(error: rum_core::node::NodeError) -> Self {
        Self::Core(error.into())
    }
}
