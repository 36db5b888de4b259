//! Operation kind tags.
//!
//! The tag is stored in the `type` field of every serialized operation and
//! selects which payload shape the second decode pass expects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The eight operation kinds a bug log may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    /// First operation of every bug: title and opening comment.
    Create,
    /// Rename the bug.
    SetTitle,
    /// Add a comment.
    AddComment,
    /// Replace the message and files of an existing comment.
    EditComment,
    /// Open or close the bug.
    SetStatus,
    /// Add and remove labels.
    LabelChange,
    /// Attach metadata to an earlier operation.
    SetMetadata,
    /// Carries metadata only; changes no state.
    NoOp,
}

/// Error returned when parsing an unknown kind tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown operation type '{raw}': expected one of create, set_title, add_comment, \
     edit_comment, set_status, label_change, set_metadata, noop"
)]
pub struct UnknownOpKind {
    pub raw: String,
}

impl OpKind {
    pub const ALL: [Self; 8] = [
        Self::Create,
        Self::SetTitle,
        Self::AddComment,
        Self::EditComment,
        Self::SetStatus,
        Self::LabelChange,
        Self::SetMetadata,
        Self::NoOp,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::SetTitle => "set_title",
            Self::AddComment => "add_comment",
            Self::EditComment => "edit_comment",
            Self::SetStatus => "set_status",
            Self::LabelChange => "label_change",
            Self::SetMetadata => "set_metadata",
            Self::NoOp => "noop",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = UnknownOpKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownOpKind { raw: s.to_string() })
    }
}

impl Serialize for OpKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OpKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
