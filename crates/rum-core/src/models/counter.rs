//! Counter (like/dislike) model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ContentStatus, SummaryDelta, TrxId};

/// Kind of object a counter or notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Post,
    Comment,
}

impl ObjectType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            other => Err(format!("unknown object type: {other}")),
        }
    }
}

/// Reaction event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Like,
    Dislike,
    UndoLike,
    UndoDislike,
}

impl CounterKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::UndoLike => "undo_like",
            Self::UndoDislike => "undo_dislike",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "undo_like" => Ok(Self::UndoLike),
            "undo_dislike" => Ok(Self::UndoDislike),
            other => Err(format!("unknown counter kind: {other}")),
        }
    }
}

/// A single publisher's reaction state on one object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reaction {
    pub liked: bool,
    pub disliked: bool,
}

impl Reaction {
    /// Replay a publisher's counters in the order given.
    pub fn replay(kinds: impl IntoIterator<Item = CounterKind>) -> Self {
        kinds.into_iter().fold(Self::default(), |state, kind| state.apply(kind).0)
    }

    /// Apply one counter, returning the new state and the summary delta it
    /// causes. Repeated likes (or undoing something never done) are no-ops.
    #[must_use]
    pub fn apply(self, kind: CounterKind) -> (Self, SummaryDelta) {
        let mut next = self;
        let mut delta = SummaryDelta::default();
        match kind {
            CounterKind::Like if !self.liked => {
                next.liked = true;
                delta.like = 1;
            }
            CounterKind::Dislike if !self.disliked => {
                next.disliked = true;
                delta.dislike = 1;
            }
            CounterKind::UndoLike if self.liked => {
                next.liked = false;
                delta.like = -1;
            }
            CounterKind::UndoDislike if self.disliked => {
                next.disliked = false;
                delta.dislike = -1;
            }
            _ => {}
        }
        (next, delta)
    }

    /// Summary change from `self` to `next`
    #[must_use]
    pub fn delta_to(self, next: Self) -> SummaryDelta {
        SummaryDelta {
            like: i64::from(next.liked) - i64::from(self.liked),
            dislike: i64::from(next.disliked) - i64::from(self.disliked),
            ..SummaryDelta::default()
        }
    }
}

/// A like/dislike/undo event for a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub trx_id: TrxId,
    pub group_id: String,
    pub object_id: TrxId,
    pub object_type: ObjectType,
    pub publisher: String,
    pub timestamp: i64,
    pub kind: CounterKind,
    pub status: ContentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_like_counts_once() {
        let (state, first) = Reaction::default().apply(CounterKind::Like);
        let (_, second) = state.apply(CounterKind::Like);
        assert_eq!(first.like, 1);
        assert!(second.is_zero());
    }

    #[test]
    fn undo_without_like_is_noop() {
        let (_, delta) = Reaction::default().apply(CounterKind::UndoLike);
        assert!(delta.is_zero());
    }

    #[test]
    fn replay_tracks_latest_state() {
        let state = Reaction::replay([
            CounterKind::Like,
            CounterKind::Dislike,
            CounterKind::UndoLike,
        ]);
        assert_eq!(
            state,
            Reaction {
                liked: false,
                disliked: true
            }
        );
    }

    #[test]
    fn delta_between_states() {
        let liked = Reaction {
            liked: true,
            disliked: false,
        };
        let disliked = Reaction {
            liked: false,
            disliked: true,
        };
        assert_eq!(
            liked.delta_to(disliked),
            SummaryDelta {
                like: -1,
                dislike: 1,
                ..SummaryDelta::default()
            }
        );
        assert!(liked.delta_to(liked).is_zero());
    }

    #[test]
    fn counter_kind_parse() {
        assert_eq!("undo_dislike".parse(), Ok(CounterKind::UndoDislike));
        assert!("boost".parse::<CounterKind>().is_err());
    }
}
