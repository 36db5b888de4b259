//! Convenience helpers: derive what is needed from the pack, build the
//! operation, validate it and append it. Nothing is appended on failure.

use super::{Bug, Entity};
use crate::entity::Id;
use crate::error::ErrorCode;
use crate::identity::Identity;
use crate::op::data::{
    AddCommentData, CreateData, EditCommentData, LabelChangeData, NoOpData, OpData,
    SetMetadataData, SetStatusData, SetTitleData,
};
use crate::op::{OpKind, Operation, ValidationError};
use crate::snapshot::Status;
use crate::text;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpsError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("the first operation of the bug is not a 'create'")]
    MissingCreate,

    #[error("bug is already {0}")]
    AlreadyInStatus(Status),

    #[error("operation {} is not part of this bug", .0.human())]
    UnknownTarget(Id),

    #[error("operation {} did not create a comment", .0.human())]
    NotAComment(Id),
}

impl OpsError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) | Self::NotAComment(_) => ErrorCode::InvalidOperation,
            Self::MissingCreate => ErrorCode::CorruptedEntity,
            Self::AlreadyInStatus(_) => ErrorCode::InvalidStateTransition,
            Self::UnknownTarget(_) => ErrorCode::EntityNotFound,
        }
    }
}

/// What happened to one requested label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelChangeStatus {
    Added,
    Removed,
    AlreadySet,
    DoesntExist,
    Invalid,
    Duplicate,
}

impl LabelChangeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::AlreadySet => "already set",
            Self::DoesntExist => "doesn't exist",
            Self::Invalid => "invalid",
            Self::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelChangeResult {
    pub label: String,
    pub status: LabelChangeStatus,
}

impl fmt::Display for LabelChangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.status.as_str())
    }
}

/// Per-label results plus the operation, when one was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelChangeOutcome {
    pub results: Vec<LabelChangeResult>,
    pub op: Option<Operation>,
}

/// Every helper except [`create`] needs a pack that opens with a `create`.
fn require_create<E: Entity>(bug: &E) -> Result<(), OpsError> {
    match bug.first_op().map(Operation::kind) {
        Some(OpKind::Create) => Ok(()),
        _ => Err(OpsError::MissingCreate),
    }
}

fn validate_and_append<E: Entity>(bug: &mut E, op: Operation) -> Result<Operation, OpsError> {
    op.validate()?;
    bug.append(op.clone());
    Ok(op)
}

/// Start a new bug.
///
/// # Errors
///
/// [`OpsError::Invalid`] if the title, message or author is rejected.
pub fn create(
    author: &Identity,
    unix_time: i64,
    title: &str,
    message: &str,
    files: Vec<Id>,
) -> Result<(Bug, Operation), OpsError> {
    let mut bug = Bug::new();
    let op = validate_and_append(
        &mut bug,
        Operation::new(
            author.clone(),
            unix_time,
            OpData::Create(CreateData {
                title: title.to_string(),
                message: message.to_string(),
                files,
            }),
        ),
    )?;
    Ok((bug, op))
}

/// Rename the bug. `was` is taken from the latest rename, or from the
/// `create` operation when the bug was never renamed.
///
/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// [`OpsError::Invalid`] if the new title is rejected.
pub fn set_title<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    title: &str,
) -> Result<Operation, OpsError> {
    let last_rename = bug.operations().iter().rev().find_map(|op| match op.data() {
        OpData::SetTitle(d) => Some(d.title.clone()),
        _ => None,
    });
    let was = match last_rename {
        Some(was) => was,
        None => bug
            .first_op()
            .and_then(Operation::create_title)
            .ok_or(OpsError::MissingCreate)?
            .to_string(),
    };

    validate_and_append(
        bug,
        Operation::new(
            author.clone(),
            unix_time,
            OpData::SetTitle(SetTitleData {
                title: title.to_string(),
                was,
            }),
        ),
    )
}

/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// [`OpsError::Invalid`] if the message is empty or unsafe.
pub fn add_comment<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    message: &str,
    files: Vec<Id>,
) -> Result<Operation, OpsError> {
    require_create(&*bug)?;
    validate_and_append(
        bug,
        Operation::new(
            author.clone(),
            unix_time,
            OpData::AddComment(AddCommentData {
                message: message.to_string(),
                files,
            }),
        ),
    )
}

/// Replace the message of the comment created by operation `target`.
///
/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// [`OpsError::UnknownTarget`] or [`OpsError::NotAComment`] if `target` does
/// not name a comment of this bug, [`OpsError::Invalid`] if the message is
/// unsafe.
pub fn edit_comment<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    target: &Id,
    message: &str,
    files: Vec<Id>,
) -> Result<Operation, OpsError> {
    require_create(&*bug)?;
    let target_op = bug
        .operations()
        .iter()
        .find(|op| op.id() == target)
        .ok_or_else(|| OpsError::UnknownTarget(target.clone()))?;
    if !matches!(target_op.kind(), OpKind::Create | OpKind::AddComment) {
        return Err(OpsError::NotAComment(target.clone()));
    }

    validate_and_append(
        bug,
        Operation::new(
            author.clone(),
            unix_time,
            OpData::EditComment(EditCommentData {
                target: target.clone(),
                message: message.to_string(),
                files,
            }),
        ),
    )
}

/// Edit the opening comment, the one carried by the `create` operation.
///
/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// otherwise as [`edit_comment`].
pub fn edit_create_comment<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    message: &str,
    files: Vec<Id>,
) -> Result<Operation, OpsError> {
    let target = bug
        .first_op()
        .filter(|op| op.kind() == OpKind::Create)
        .map(|op| op.id().clone())
        .ok_or(OpsError::MissingCreate)?;
    edit_comment(bug, author, unix_time, &target, message, files)
}

fn current_status(ops: &[Operation]) -> Status {
    ops.iter()
        .rev()
        .find_map(|op| match op.data() {
            OpData::SetStatus(d) => Some(d.status),
            _ => None,
        })
        .unwrap_or(Status::Open)
}

fn current_labels(ops: &[Operation]) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();
    for op in ops {
        if let OpData::LabelChange(d) = op.data() {
            labels.extend(d.added.iter().cloned());
            for label in &d.removed {
                labels.remove(label);
            }
        }
    }
    labels
}

/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// [`OpsError::AlreadyInStatus`] if the bug already has `status`.
pub fn set_status<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    status: Status,
) -> Result<Operation, OpsError> {
    require_create(&*bug)?;
    if current_status(bug.operations()) == status {
        return Err(OpsError::AlreadyInStatus(status));
    }
    validate_and_append(
        bug,
        Operation::new(
            author.clone(),
            unix_time,
            OpData::SetStatus(SetStatusData { status }),
        ),
    )
}

/// # Errors
///
/// See [`set_status`].
pub fn open<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
) -> Result<Operation, OpsError> {
    set_status(bug, author, unix_time, Status::Open)
}

/// # Errors
///
/// See [`set_status`].
pub fn close<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
) -> Result<Operation, OpsError> {
    set_status(bug, author, unix_time, Status::Closed)
}

/// Add and remove labels, reporting what happened to each one.
///
/// Labels that would not change anything are reported and left out of the
/// operation. When nothing changes at all no operation is appended.
///
/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// [`OpsError::Invalid`] if the author or timestamp is rejected.
pub fn change_labels<E: Entity, S: AsRef<str>>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    add: &[S],
    remove: &[S],
) -> Result<LabelChangeOutcome, OpsError> {
    require_create(&*bug)?;
    let current = current_labels(bug.operations());
    let mut results = Vec::with_capacity(add.len() + remove.len());
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut added = Vec::new();
    let mut removed = Vec::new();

    let mut push = |label: &str, status| {
        results.push(LabelChangeResult {
            label: label.to_string(),
            status,
        });
    };

    for label in add {
        let label = label.as_ref();
        if text::is_empty(label) || !text::is_safe_one_line(label) {
            push(label, LabelChangeStatus::Invalid);
        } else if !seen.insert(label) {
            push(label, LabelChangeStatus::Duplicate);
        } else if current.contains(label) {
            push(label, LabelChangeStatus::AlreadySet);
        } else {
            added.push(label.to_string());
            push(label, LabelChangeStatus::Added);
        }
    }

    for label in remove {
        let label = label.as_ref();
        if text::is_empty(label) || !text::is_safe_one_line(label) {
            push(label, LabelChangeStatus::Invalid);
        } else if !seen.insert(label) {
            push(label, LabelChangeStatus::Duplicate);
        } else if !current.contains(label) {
            push(label, LabelChangeStatus::DoesntExist);
        } else {
            removed.push(label.to_string());
            push(label, LabelChangeStatus::Removed);
        }
    }

    if added.is_empty() && removed.is_empty() {
        return Ok(LabelChangeOutcome { results, op: None });
    }

    let op = validate_and_append(
        bug,
        Operation::new(
            author.clone(),
            unix_time,
            OpData::LabelChange(LabelChangeData { added, removed }),
        ),
    )?;
    Ok(LabelChangeOutcome {
        results,
        op: Some(op),
    })
}

/// Attach metadata to an earlier operation of the bug.
///
/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// [`OpsError::UnknownTarget`] if `target` is not in the pack,
/// [`OpsError::Invalid`] if the metadata is empty or unsafe.
pub fn set_metadata<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    target: &Id,
    new_metadata: BTreeMap<String, String>,
) -> Result<Operation, OpsError> {
    require_create(&*bug)?;
    if !bug.operations().iter().any(|op| op.id() == target) {
        return Err(OpsError::UnknownTarget(target.clone()));
    }
    validate_and_append(
        bug,
        Operation::new(
            author.clone(),
            unix_time,
            OpData::SetMetadata(SetMetadataData {
                target: target.clone(),
                new_metadata,
            }),
        ),
    )
}

/// Append an operation that only carries metadata.
///
/// # Errors
///
/// [`OpsError::MissingCreate`] if the pack does not start with a `create`,
/// [`OpsError::Invalid`] if the metadata or author is rejected.
pub fn noop<E: Entity>(
    bug: &mut E,
    author: &Identity,
    unix_time: i64,
    metadata: BTreeMap<String, String>,
) -> Result<Operation, OpsError> {
    require_create(&*bug)?;
    let op = metadata.into_iter().fold(
        Operation::new(author.clone(), unix_time, OpData::NoOp(NoOpData {})),
        |op, (key, value)| op.with_metadata(key, value),
    );
    validate_and_append(bug, op)
}
