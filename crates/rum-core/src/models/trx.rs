//! Transaction id model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque transaction id assigned by the node to every accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrxId(String);

impl TrxId {
    /// Wrap a node-assigned id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrxId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TrxId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
