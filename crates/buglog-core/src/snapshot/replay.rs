//! Deterministic replay of an operation pack.
//!
//! Single pass, in log order: every operation is validated and then applied.
//! There is no reordering and no deduplication; the pack is trusted to be the
//! merged, ordered log of one bug.

use super::Snapshot;
use crate::entity::Id;
use crate::error::ErrorCode;
use crate::op::{OpKind, Operation, ValidationError};
use tracing::debug;

/// Why a pack could not be replayed. No partial snapshot is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("operation pack is empty")]
    Empty,

    #[error("first operation is '{found}', expected 'create'")]
    MissingCreate { found: OpKind },

    #[error("bug {}: operation #{position} is a second 'create'", .entity.human())]
    DuplicateCreate { entity: Id, position: usize },

    #[error("bug {}: operation #{position} ({}) is invalid: {source}", .entity.human(), .op.human())]
    Corrupted {
        entity: Id,
        position: usize,
        op: Id,
        #[source]
        source: ValidationError,
    },
}

impl ReplayError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::CorruptedEntity
    }
}

/// Fold `ops` into a snapshot.
///
/// # Errors
///
/// Returns [`ReplayError`] if the pack is empty, does not start with a single
/// `create`, or contains an operation that fails validation.
pub fn replay(ops: &[Operation]) -> Result<Snapshot, ReplayError> {
    let Some(first) = ops.first() else {
        return Err(ReplayError::Empty);
    };
    if first.kind() != OpKind::Create {
        return Err(ReplayError::MissingCreate {
            found: first.kind(),
        });
    }

    let mut snapshot = Snapshot::seed(first);
    for (position, op) in ops.iter().enumerate() {
        if position > 0 && op.kind() == OpKind::Create {
            return Err(ReplayError::DuplicateCreate {
                entity: snapshot.id.clone(),
                position,
            });
        }
        op.validate().map_err(|source| ReplayError::Corrupted {
            entity: snapshot.id.clone(),
            position,
            op: op.id().clone(),
            source,
        })?;
        op.apply(&mut snapshot);
    }

    debug!(
        bug = %snapshot.id.human(),
        ops = ops.len(),
        comments = snapshot.comments.len(),
        "replayed"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::fixture;
    use crate::op::data::*;
    use crate::op::tests::create_op;
    use crate::snapshot::{Status, TimelineItem};

    fn comment(ts: i64, message: &str) -> Operation {
        Operation::new(
            fixture("Bob"),
            ts,
            OpData::AddComment(AddCommentData {
                message: message.into(),
                files: vec![],
            }),
        )
    }

    #[test]
    fn empty_pack_is_an_error() {
        assert_eq!(replay(&[]), Err(ReplayError::Empty));
    }

    #[test]
    fn pack_must_start_with_create() {
        assert_eq!(
            replay(&[comment(1, "hi")]),
            Err(ReplayError::MissingCreate {
                found: OpKind::AddComment,
            })
        );
    }

    #[test]
    fn second_create_is_rejected() {
        let alice = fixture("Alice");
        let ops = [create_op(&alice, 1, "a"), create_op(&alice, 2, "b")];
        assert!(matches!(
            replay(&ops),
            Err(ReplayError::DuplicateCreate { position: 1, .. })
        ));
    }

    #[test]
    fn invalid_operation_reports_position() {
        let create = create_op(&fixture("Alice"), 1, "Crash");
        let bad = comment(2, "   ");
        let err = replay(&[create.clone(), comment(2, "ok"), bad.clone()])
            .expect_err("should fail");
        assert_eq!(
            err,
            ReplayError::Corrupted {
                entity: create.id().clone(),
                position: 2,
                op: bad.id().clone(),
                source: ValidationError::EmptyField { field: "message" },
            }
        );
        assert_eq!(err.code(), ErrorCode::CorruptedEntity);
    }

    #[test]
    fn full_fold() {
        let alice = fixture("Alice");
        let create = create_op(&alice, 1, "Crash");
        let ops = vec![
            create.clone(),
            comment(2, "repro attached"),
            Operation::new(
                alice.clone(),
                3,
                OpData::SetStatus(SetStatusData {
                    status: Status::Closed,
                }),
            ),
        ];
        let snap = replay(&ops).expect("replay");
        assert_eq!(snap.id, *create.id());
        assert_eq!(snap.status, Status::Closed);
        assert_eq!(snap.comments.len(), 2);
        assert_eq!(snap.edited_at, 3);
        assert_eq!(snap.participants.len(), 2);
        assert!(matches!(snap.timeline[2], TimelineItem::SetStatus(_)));
        assert_eq!(replay(&ops), Ok(snap));
    }
}
