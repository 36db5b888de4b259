//! Materialized state of a bug.
//!
//! A [`Snapshot`] is never edited directly: it is produced by folding a bug's
//! operations in order with [`replay`]. Two replicas holding the same pack
//! therefore always derive equal snapshots.

pub mod replay;
pub mod timeline;

pub use replay::{ReplayError, replay};
pub use timeline::{
    CommentHistoryStep, CommentTimelineItem, LabelChangeTimelineItem, SetStatusTimelineItem,
    SetTitleTimelineItem, TimelineItem,
};

use crate::entity::{CombinedId, Id};
use crate::identity::Identity;
use crate::op::Operation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Whether a bug is open or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Open,
    Closed,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}': expected open or closed")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Current (flattened) view of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CombinedId,
    pub author: Identity,
    pub message: String,
    pub files: Vec<Id>,
    pub unix_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub id: Id,
    pub title: String,
    pub status: Status,
    pub labels: BTreeSet<String>,
    pub author: Identity,
    pub created_at: i64,
    /// Timestamp of the last applied operation.
    pub edited_at: i64,
    /// Everyone who authored an operation, in first-seen order.
    pub actors: Vec<Identity>,
    /// Everyone who opened the bug or commented, in first-seen order.
    pub participants: Vec<Identity>,
    pub comments: Vec<Comment>,
    /// Metadata of every applied operation, keyed by operation id.
    pub metadata: BTreeMap<Id, BTreeMap<String, String>>,
    pub timeline: Vec<TimelineItem>,
}

impl Snapshot {
    /// Empty snapshot for the bug whose first operation is `first`.
    pub(crate) fn seed(first: &Operation) -> Self {
        Self {
            id: first.id().clone(),
            title: String::new(),
            status: Status::Open,
            labels: BTreeSet::new(),
            author: first.author().clone(),
            created_at: first.timestamp(),
            edited_at: first.timestamp(),
            actors: Vec::new(),
            participants: Vec::new(),
            comments: Vec::new(),
            metadata: BTreeMap::new(),
            timeline: Vec::new(),
        }
    }

    #[must_use]
    pub fn human_id(&self) -> &str {
        self.id.human()
    }

    pub(crate) fn add_actor(&mut self, identity: &Identity) {
        if !self.actors.contains(identity) {
            self.actors.push(identity.clone());
        }
    }

    pub(crate) fn add_participant(&mut self, identity: &Identity) {
        if !self.participants.contains(identity) {
            self.participants.push(identity.clone());
        }
    }

    /// Look up a comment by its combined id.
    #[must_use]
    pub fn comment(&self, id: &CombinedId) -> Option<&Comment> {
        self.comments.iter().find(|c| &c.id == id)
    }

    /// Resolve a comment from a prefix of its combined key.
    #[must_use]
    pub fn comments_with_prefix(&self, prefix: &str) -> Vec<&Comment> {
        self.comments.iter().filter(|c| c.id.has_prefix(prefix)).collect()
    }

    /// Comment timeline item (with history) for a combined id.
    #[must_use]
    pub fn comment_item(&self, id: &CombinedId) -> Option<&CommentTimelineItem> {
        self.timeline
            .iter()
            .filter_map(TimelineItem::as_comment)
            .find(|c| c.id() == id)
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Metadata of one operation, if it was applied.
    #[must_use]
    pub fn op_metadata(&self, op: &Id) -> Option<&BTreeMap<String, String>> {
        self.metadata.get(op)
    }
}
