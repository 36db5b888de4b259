//! Operations: the immutable, content-addressed entries of a bug log.
//!
//! An [`Operation`] is an [`OpBase`] (kind, author, timestamp, metadata) plus
//! a typed [`OpData`] payload. On the wire it is a single flat JSON object:
//!
//! ```json
//! {"type":"set_title","author":{...},"timestamp":1700000000,"title":"New","was":"Old"}
//! ```
//!
//! Decoding runs two independent passes over the same object, one for the
//! base fields and one for the payload selected by `type`, then merges them.
//! The id of an operation is the BLAKE3 hash of its canonical wire form and is
//! computed at most once.

mod apply;
pub mod data;
pub mod kind;
pub mod validate;

pub use data::{
    AddCommentData, CreateData, DataParseError, EditCommentData, LabelChangeData, NoOpData,
    OpData, SetMetadataData, SetStatusData, SetTitleData,
};
pub use kind::{OpKind, UnknownOpKind};
pub use validate::ValidationError;

use crate::entity::Id;
use crate::entity::canonical::to_canonical_string;
use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Fields shared by every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpBase {
    /// Declared kind. Must agree with the payload variant.
    #[serde(rename = "type")]
    pub kind: OpKind,
    pub author: Identity,
    /// Unix time in seconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Error returned when a wire object cannot be decoded into an operation.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("operation must be a JSON object")]
    NotAnObject,
    #[error("invalid operation base: {0}")]
    Base(#[source] serde_json::Error),
    #[error(transparent)]
    Data(#[from] DataParseError),
}

/// One entry of a bug's operation log.
#[derive(Debug, Clone)]
pub struct Operation {
    base: OpBase,
    data: OpData,
    id: OnceLock<Id>,
}

impl Operation {
    /// Build an operation whose declared kind is taken from the payload.
    #[must_use]
    pub fn new(author: Identity, timestamp: i64, data: OpData) -> Self {
        Self::from_parts(
            OpBase {
                kind: data.kind(),
                author,
                timestamp,
                metadata: BTreeMap::new(),
            },
            data,
        )
    }

    /// Build an operation stamped with the current wall-clock time.
    #[must_use]
    pub fn now(author: Identity, data: OpData) -> Self {
        Self::new(author, chrono::Utc::now().timestamp(), data)
    }

    /// Assemble an operation from an explicit base and payload.
    ///
    /// Nothing checks that `base.kind` matches the payload here;
    /// [`Operation::validate`] does.
    #[must_use]
    pub const fn from_parts(base: OpBase, data: OpData) -> Self {
        Self {
            base,
            data,
            id: OnceLock::new(),
        }
    }

    /// Attach a metadata entry. Only meaningful before the operation is
    /// appended anywhere, since it changes the id.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base.metadata.insert(key.into(), value.into());
        self.id = OnceLock::new();
        self
    }

    /// Content hash of the canonical wire form, memoized.
    ///
    /// # Panics
    ///
    /// Panics if the operation cannot be serialized, which is an invariant
    /// violation of the operation types rather than a runtime condition.
    #[must_use]
    pub fn id(&self) -> &Id {
        self.id.get_or_init(|| {
            let value = self
                .to_json_value()
                .expect("operation is always serializable");
            Id::of_json(&value)
        })
    }

    #[must_use]
    pub const fn base(&self) -> &OpBase {
        &self.base
    }

    #[must_use]
    pub const fn data(&self) -> &OpData {
        &self.data
    }

    #[must_use]
    pub const fn kind(&self) -> OpKind {
        self.base.kind
    }

    #[must_use]
    pub const fn author(&self) -> &Identity {
        &self.base.author
    }

    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.base.timestamp
    }

    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.base.metadata
    }

    /// Title carried by a `create` operation.
    #[must_use]
    pub fn create_title(&self) -> Option<&str> {
        match &self.data {
            OpData::Create(d) => Some(&d.title),
            _ => None,
        }
    }

    /// Canonical single-line wire form, as stored in a pack file.
    ///
    /// # Errors
    ///
    /// Returns an error only if a field fails to serialize.
    pub fn to_canonical_line(&self) -> Result<String, serde_json::Error> {
        Ok(to_canonical_string(&self.to_json_value()?))
    }

    /// Flat wire object: base fields plus payload fields.
    ///
    /// # Errors
    ///
    /// Returns an error only if a field fails to serialize.
    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        let serde_json::Value::Object(mut map) = serde_json::to_value(&self.base)? else {
            return Err(serde::ser::Error::custom("operation base is not an object"));
        };
        if let serde_json::Value::Object(payload) = self.data.to_json_value()? {
            for (key, value) in payload {
                debug_assert!(!map.contains_key(&key), "payload field '{key}' shadows base");
                map.entry(key).or_insert(value);
            }
        }
        Ok(serde_json::Value::Object(map))
    }

    /// Decode a wire object with the two-pass scheme.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the base fields or the payload for the
    /// declared kind are missing or malformed.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let base = OpBase::deserialize(value).map_err(DecodeError::Base)?;
        let data = OpData::deserialize_for(base.kind, value)?;
        Ok(Self::from_parts(base, data))
    }
}

impl std::str::FromStr for Operation {
    type Err = DecodeError;

    /// Decode one line of a stored pack.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let value: serde_json::Value = serde_json::from_str(line).map_err(DecodeError::Json)?;
        Self::from_json_value(&value)
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.data == other.data
    }
}

impl Eq for Operation {}

impl Serialize for Operation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json_value(&value).map_err(serde::de::Error::custom)
    }
}
