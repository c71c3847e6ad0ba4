//! Content status model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a locally stored content record.
///
/// Records move forward only: `waiting → syncing → synced`, optionally
/// `synced → replaced` once a newer record for the same entity arrives.
/// `fail` is reached from `waiting`/`syncing` when the node gives up on a
/// submission. `replaced` and `fail` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    /// Submitted while the node was still catching up on the group
    Waiting,
    /// Accepted by the node, not yet observed through polling
    Syncing,
    /// Observed through polling
    Synced,
    /// Superseded by a newer synced record for the same entity
    Replaced,
    /// Dropped by the node after exceeding its retry ceiling
    Fail,
}

impl ContentStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Waiting,
        Self::Syncing,
        Self::Synced,
        Self::Replaced,
        Self::Fail,
    ];

    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Replaced => "replaced",
            Self::Fail => "fail",
        }
    }

    /// Whether the record is still waiting for its remote echo.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Waiting | Self::Syncing)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Syncing | Self::Synced | Self::Fail)
                | (Self::Syncing, Self::Synced | Self::Fail)
                | (Self::Synced, Self::Replaced)
        )
    }

    /// Statuses a record may be in for a write to `self` to be accepted.
    ///
    /// Used to build `WHERE status IN (...)` guards so the store never
    /// moves a record backwards.
    #[must_use]
    pub fn predecessors(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "syncing" => Ok(Self::Syncing),
            "synced" => Ok(Self::Synced),
            "replaced" => Ok(Self::Replaced),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown content status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(ContentStatus::Waiting.can_transition_to(ContentStatus::Syncing));
        assert!(ContentStatus::Syncing.can_transition_to(ContentStatus::Synced));
        assert!(ContentStatus::Synced.can_transition_to(ContentStatus::Replaced));
        assert!(ContentStatus::Syncing.can_transition_to(ContentStatus::Fail));
    }

    #[test]
    fn backward_and_terminal_transitions_are_rejected() {
        assert!(!ContentStatus::Synced.can_transition_to(ContentStatus::Syncing));
        assert!(!ContentStatus::Replaced.can_transition_to(ContentStatus::Synced));
        assert!(!ContentStatus::Fail.can_transition_to(ContentStatus::Syncing));
        assert!(!ContentStatus::Synced.can_transition_to(ContentStatus::Fail));
        assert!(!ContentStatus::Synced.can_transition_to(ContentStatus::Synced));
    }

    #[test]
    fn predecessors_of_synced() {
        assert_eq!(
            ContentStatus::Synced.predecessors(),
            vec![ContentStatus::Waiting, ContentStatus::Syncing]
        );
        assert!(ContentStatus::Waiting.predecessors().is_empty());
    }

    #[test]
    fn parse_roundtrip() {
        for status in ContentStatus::ALL {
            assert_eq!(status.as_str().parse::<ContentStatus>(), Ok(status));
        }
        assert!("deleted".parse::<ContentStatus>().is_err());
    }
}
