//! Typed payloads, one struct per [`OpKind`].
//!
//! Payload structs never name a base field (`type`, `author`, `timestamp`,
//! `metadata`). Unknown keys are ignored, so each struct can be decoded from
//! the full wire object without seeing the base fields.

use super::kind::OpKind;
use crate::entity::Id;
use crate::snapshot::Status;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateData {
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTitleData {
    pub title: String,
    /// The title this operation replaces.
    pub was: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddCommentData {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCommentData {
    /// Id of the operation that created the comment.
    pub target: Id,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStatusData {
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelChangeData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMetadataData {
    /// Id of the operation receiving the metadata.
    pub target: Id,
    pub new_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoOpData {}

/// Payload of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpData {
    Create(CreateData),
    SetTitle(SetTitleData),
    AddComment(AddCommentData),
    EditComment(EditCommentData),
    SetStatus(SetStatusData),
    LabelChange(LabelChangeData),
    SetMetadata(SetMetadataData),
    NoOp(NoOpData),
}

/// Error returned when a payload does not match its declared kind.
#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} payload: {source}")]
pub struct DataParseError {
    pub kind: OpKind,
    #[source]
    pub source: serde_json::Error,
}

impl OpData {
    /// The kind tag matching this payload.
    #[must_use]
    pub const fn kind(&self) -> OpKind {
        match self {
            Self::Create(_) => OpKind::Create,
            Self::SetTitle(_) => OpKind::SetTitle,
            Self::AddComment(_) => OpKind::AddComment,
            Self::EditComment(_) => OpKind::EditComment,
            Self::SetStatus(_) => OpKind::SetStatus,
            Self::LabelChange(_) => OpKind::LabelChange,
            Self::SetMetadata(_) => OpKind::SetMetadata,
            Self::NoOp(_) => OpKind::NoOp,
        }
    }

    /// Decode the payload for `kind` out of a wire object.
    ///
    /// # Errors
    ///
    /// Returns a [`DataParseError`] if the object lacks a field the kind
    /// requires or a field has the wrong shape.
    pub fn deserialize_for(
        kind: OpKind,
        value: &serde_json::Value,
    ) -> Result<Self, DataParseError> {
        let result = match kind {
            OpKind::Create => CreateData::deserialize(value).map(Self::Create),
            OpKind::SetTitle => SetTitleData::deserialize(value).map(Self::SetTitle),
            OpKind::AddComment => AddCommentData::deserialize(value).map(Self::AddComment),
            OpKind::EditComment => EditCommentData::deserialize(value).map(Self::EditComment),
            OpKind::SetStatus => SetStatusData::deserialize(value).map(Self::SetStatus),
            OpKind::LabelChange => LabelChangeData::deserialize(value).map(Self::LabelChange),
            OpKind::SetMetadata => SetMetadataData::deserialize(value).map(Self::SetMetadata),
            OpKind::NoOp => NoOpData::deserialize(value).map(Self::NoOp),
        };
        result.map_err(|source| DataParseError { kind, source })
    }

    /// Serialize the payload fields to a JSON value (an object).
    ///
    /// # Errors
    ///
    /// Returns an error only if a payload struct fails to serialize.
    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Create(d) => serde_json::to_value(d),
            Self::SetTitle(d) => serde_json::to_value(d),
            Self::AddComment(d) => serde_json::to_value(d),
            Self::EditComment(d) => serde_json::to_value(d),
            Self::SetStatus(d) => serde_json::to_value(d),
            Self::LabelChange(d) => serde_json::to_value(d),
            Self::SetMetadata(d) => serde_json::to_value(d),
            Self::NoOp(d) => serde_json::to_value(d),
        }
    }
}
