//! Operation validation.
//!
//! Runs in two tiers. The structural tier checks what every operation shares:
//! the declared kind agrees with the payload, the author is a valid identity,
//! the timestamp is positive and the metadata is made of safe single lines.
//! The semantic tier then checks the payload of each kind. The first failure
//! is returned and names the offending field.

use super::data::{LabelChangeData, OpData};
use super::{OpKind, Operation};
use crate::entity::Id;
use crate::error::ErrorCode;
use crate::identity::IdentityError;
use crate::text;
use std::collections::{BTreeMap, BTreeSet};

/// Why an operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("declared type '{declared}' does not match {actual} payload")]
    KindMismatch { declared: OpKind, actual: OpKind },

    #[error("invalid author: {0}")]
    InvalidAuthor(#[from] IdentityError),

    #[error("timestamp must be positive, got {0}")]
    InvalidTimestamp(i64),

    #[error("{field} key '{key}' is empty or not a single safe line")]
    InvalidMetadataKey { field: &'static str, key: String },

    #[error("{field} value for '{key}' is not a single safe line")]
    InvalidMetadataValue { field: &'static str, key: String },

    #[error("{field} is empty")]
    EmptyField { field: &'static str },

    #[error("{field} contains unsafe characters or is too long")]
    UnsafeField { field: &'static str },

    #[error("{field} lists file {file} more than once")]
    DuplicateFile { field: &'static str, file: Id },

    #[error("no label added or removed")]
    NoLabels,

    #[error("label '{label}' is both added and removed")]
    LabelConflict { label: String },

    #[error("label '{label}' appears more than once in {field}")]
    DuplicateLabel { field: &'static str, label: String },
}

impl ValidationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidOperation
    }
}

impl Operation {
    /// Check that the operation is well formed and safe to append.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_base()?;
        match self.data() {
            OpData::Create(d) => {
                one_line_title("title", &d.title)?;
                safe_message("message", &d.message)?;
                unique_files(&d.files)
            }
            OpData::SetTitle(d) => {
                one_line_title("title", &d.title)?;
                if !text::is_safe_one_line(&d.was) {
                    return Err(ValidationError::UnsafeField { field: "was" });
                }
                Ok(())
            }
            OpData::AddComment(d) => {
                if text::is_empty(&d.message) {
                    return Err(ValidationError::EmptyField { field: "message" });
                }
                safe_message("message", &d.message)?;
                unique_files(&d.files)
            }
            // An empty message is how a comment gets blanked.
            OpData::EditComment(d) => {
                safe_message("message", &d.message)?;
                unique_files(&d.files)
            }
            OpData::SetStatus(_) | OpData::NoOp(_) => Ok(()),
            OpData::LabelChange(d) => validate_labels(d),
            OpData::SetMetadata(d) => {
                if d.new_metadata.is_empty() {
                    return Err(ValidationError::EmptyField {
                        field: "new_metadata",
                    });
                }
                safe_metadata("new_metadata", &d.new_metadata)
            }
        }
    }

    fn validate_base(&self) -> Result<(), ValidationError> {
        let actual = self.data().kind();
        if self.kind() != actual {
            return Err(ValidationError::KindMismatch {
                declared: self.kind(),
                actual,
            });
        }
        self.author().validate()?;
        if self.timestamp() <= 0 {
            return Err(ValidationError::InvalidTimestamp(self.timestamp()));
        }
        safe_metadata("metadata", self.metadata())
    }
}

fn one_line_title(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if text::is_empty(value) {
        return Err(ValidationError::EmptyField { field });
    }
    if !text::is_safe_one_line(value) {
        return Err(ValidationError::UnsafeField { field });
    }
    Ok(())
}

fn safe_message(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if text::is_safe(value) {
        Ok(())
    } else {
        Err(ValidationError::UnsafeField { field })
    }
}

fn unique_files(files: &[Id]) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for file in files {
        if !seen.insert(file) {
            return Err(ValidationError::DuplicateFile {
                field: "files",
                file: file.clone(),
            });
        }
    }
    Ok(())
}

fn safe_metadata(
    field: &'static str,
    metadata: &BTreeMap<String, String>,
) -> Result<(), ValidationError> {
    for (key, value) in metadata {
        if text::is_empty(key) || !text::is_safe_one_line(key) {
            return Err(ValidationError::InvalidMetadataKey {
                field,
                key: key.clone(),
            });
        }
        if !text::is_safe_one_line(value) {
            return Err(ValidationError::InvalidMetadataValue {
                field,
                key: key.clone(),
            });
        }
    }
    Ok(())
}

fn validate_labels(data: &LabelChangeData) -> Result<(), ValidationError> {
    if data.added.is_empty() && data.removed.is_empty() {
        return Err(ValidationError::NoLabels);
    }
    let added = label_set("added", &data.added)?;
    let removed = label_set("removed", &data.removed)?;
    if let Some(label) = added.intersection(&removed).next() {
        return Err(ValidationError::LabelConflict {
            label: (*label).to_string(),
        });
    }
    Ok(())
}

fn label_set<'a>(
    field: &'static str,
    labels: &'a [String],
) -> Result<BTreeSet<&'a str>, ValidationError> {
    let mut set = BTreeSet::new();
    for label in labels {
        one_line_title(field, label)?;
        if !set.insert(label.as_str()) {
            return Err(ValidationError::DuplicateLabel {
                field,
                label: label.clone(),
            });
        }
    }
    Ok(set)
}
