//! Timeline items and comment edit history.
//!
//! The timeline keeps one item per state-changing operation, in replay order.
//! Comment items are the only mutable ones: an edit appends a history step and
//! updates the current view, but the item keeps the id of the operation that
//! created the comment.

use super::{Comment, Status};
use crate::entity::{CombinedId, Id};
use crate::identity::Identity;
use crate::text;
use serde::Serialize;

/// One version of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentHistoryStep {
    /// Who made the edit. `None` for the original version.
    pub editor: Option<Identity>,
    pub message: String,
    pub files: Vec<Id>,
    pub unix_time: i64,
}

/// A comment together with every version it went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentTimelineItem {
    id: CombinedId,
    pub author: Identity,
    pub message: String,
    pub files: Vec<Id>,
    pub created_at: i64,
    pub last_edit: i64,
    pub history: Vec<CommentHistoryStep>,
}

impl CommentTimelineItem {
    /// Seed an item from the original comment.
    #[must_use]
    pub fn new(comment: &Comment) -> Self {
        Self {
            id: comment.id.clone(),
            author: comment.author.clone(),
            message: comment.message.clone(),
            files: comment.files.clone(),
            created_at: comment.unix_time,
            last_edit: comment.unix_time,
            history: vec![CommentHistoryStep {
                editor: None,
                message: comment.message.clone(),
                files: comment.files.clone(),
                unix_time: comment.unix_time,
            }],
        }
    }

    /// Record a new version. `comment.author` is the editor.
    pub fn append(&mut self, comment: &Comment) {
        self.message.clone_from(&comment.message);
        self.files.clone_from(&comment.files);
        self.last_edit = comment.unix_time;
        self.history.push(CommentHistoryStep {
            editor: Some(comment.author.clone()),
            message: comment.message.clone(),
            files: comment.files.clone(),
            unix_time: comment.unix_time,
        });
    }

    #[must_use]
    pub const fn id(&self) -> &CombinedId {
        &self.id
    }

    #[must_use]
    pub fn edited(&self) -> bool {
        self.history.len() > 1
    }

    /// True when the current message is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        text::is_empty(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetTitleTimelineItem {
    pub id: CombinedId,
    pub author: Identity,
    pub unix_time: i64,
    pub title: String,
    pub was: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetStatusTimelineItem {
    pub id: CombinedId,
    pub author: Identity,
    pub unix_time: i64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelChangeTimelineItem {
    pub id: CombinedId,
    pub author: Identity,
    pub unix_time: i64,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// An entry of a bug's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineItem {
    Create(CommentTimelineItem),
    AddComment(CommentTimelineItem),
    SetTitle(SetTitleTimelineItem),
    SetStatus(SetStatusTimelineItem),
    LabelChange(LabelChangeTimelineItem),
}

impl TimelineItem {
    #[must_use]
    pub const fn id(&self) -> &CombinedId {
        match self {
            Self::Create(c) | Self::AddComment(c) => c.id(),
            Self::SetTitle(i) => &i.id,
            Self::SetStatus(i) => &i.id,
            Self::LabelChange(i) => &i.id,
        }
    }

    #[must_use]
    pub const fn author(&self) -> &Identity {
        match self {
            Self::Create(c) | Self::AddComment(c) => &c.author,
            Self::SetTitle(i) => &i.author,
            Self::SetStatus(i) => &i.author,
            Self::LabelChange(i) => &i.author,
        }
    }

    /// When the item was created (not last edited).
    #[must_use]
    pub const fn unix_time(&self) -> i64 {
        match self {
            Self::Create(c) | Self::AddComment(c) => c.created_at,
            Self::SetTitle(i) => i.unix_time,
            Self::SetStatus(i) => i.unix_time,
            Self::LabelChange(i) => i.unix_time,
        }
    }

    #[must_use]
    pub const fn as_comment(&self) -> Option<&CommentTimelineItem> {
        match self {
            Self::Create(c) | Self::AddComment(c) => Some(c),
            _ => None,
        }
    }

    pub const fn as_comment_mut(&mut self) -> Option<&mut CommentTimelineItem> {
        match self {
            Self::Create(c) | Self::AddComment(c) => Some(c),
            _ => None,
        }
    }
}
