//! Bugs as operation packs.
//!
//! A [`Bug`] owns the ordered operations of one bug. Operations appended in
//! memory are *staged*; once a store has written them they are *durable*.
//! Nothing ever removes or rewrites an operation. The bug's id is the id of
//! its first (`create`) operation.
//!
//! Merging two packs keeps the prefix they share and orders everything after
//! it by `(timestamp, id)`. The result depends only on the two packs, never on
//! which side merges, so replicas that pull from each other converge on the
//! same order.

pub mod ops;

pub use ops::{LabelChangeOutcome, LabelChangeResult, LabelChangeStatus, OpsError};

use crate::entity::Id;
use crate::op::Operation;
use crate::snapshot::{ReplayError, Snapshot, replay};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// An append-only log of operations.
pub trait Entity {
    fn operations(&self) -> &[Operation];

    fn first_op(&self) -> Option<&Operation> {
        self.operations().first()
    }

    fn append(&mut self, op: Operation);
}

/// Outcome of [`Bug::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStatus {
    /// The remote pack brought nothing new.
    Nothing,
    /// This many remote operations were staged.
    Updated { added: usize },
    /// The packs belong to different bugs; nothing was merged.
    Invalid { local: Id, remote: Id },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bug {
    ops: Vec<Operation>,
    durable: usize,
    /// Set when a merge moved operations that were already durable.
    reordered: bool,
}

impl Bug {
    /// A bug with no operations yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A bug whose operations were read back from durable storage.
    #[must_use]
    pub fn from_durable(ops: Vec<Operation>) -> Self {
        let durable = ops.len();
        Self {
            ops,
            durable,
            reordered: false,
        }
    }

    /// Id of the first operation, if any.
    #[must_use]
    pub fn id(&self) -> Option<&Id> {
        self.first_op().map(Operation::id)
    }

    /// Operations appended since the last commit.
    #[must_use]
    pub fn staged(&self) -> &[Operation] {
        &self.ops[self.durable..]
    }

    #[must_use]
    pub fn has_staged(&self) -> bool {
        self.durable < self.ops.len()
    }

    /// True when durable operations changed position, so a store must
    /// replace the whole pack instead of appending the staged tail.
    #[must_use]
    pub const fn needs_rewrite(&self) -> bool {
        self.reordered
    }

    /// Mark every staged operation as durable. Called by stores after a
    /// successful write.
    pub fn mark_durable(&mut self) {
        self.durable = self.ops.len();
        self.reordered = false;
    }

    #[must_use]
    pub fn contains(&self, op: &Id) -> bool {
        self.ops.iter().any(|o| o.id() == op)
    }

    /// Replay the pack into a snapshot.
    ///
    /// # Errors
    ///
    /// See [`replay`].
    pub fn compile(&self) -> Result<Snapshot, ReplayError> {
        replay(&self.ops)
    }

    /// Union `other` into this bug.
    ///
    /// The prefix both packs share stays in place. Every operation after it,
    /// local or remote, is ordered by `(timestamp, id)`, so `a.merge(&b)` and
    /// `b.merge(&a)` produce the same pack. Merging the same pack twice is a
    /// no-op.
    pub fn merge(&mut self, other: &Self) -> MergeStatus {
        if other.ops.is_empty() {
            return MergeStatus::Nothing;
        }
        if self.ops.is_empty() {
            self.ops.clone_from(&other.ops);
            return MergeStatus::Updated {
                added: other.ops.len(),
            };
        }
        match (self.id(), other.id()) {
            (Some(local), Some(remote)) if local != remote => {
                return MergeStatus::Invalid {
                    local: local.clone(),
                    remote: remote.clone(),
                };
            }
            _ => {}
        }

        let shared = common_prefix(&self.ops, &other.ops);
        let mut seen: HashSet<Id> = self.ops.iter().map(|op| op.id().clone()).collect();
        let mut tail: Vec<Operation> = self.ops[shared..].to_vec();
        let local_tail = tail.len();
        for op in &other.ops[shared..] {
            if seen.insert(op.id().clone()) {
                tail.push(op.clone());
            }
        }
        let added = tail.len() - local_tail;
        tail.sort_by(causal_order);

        let mut merged = self.ops[..shared].to_vec();
        merged.extend(tail);
        let kept = common_prefix(&self.ops, &merged);
        if added == 0 && kept == self.ops.len() {
            return MergeStatus::Nothing;
        }

        if kept < self.durable {
            self.durable = kept;
            self.reordered = true;
        }
        self.ops = merged;
        debug!(bug = ?self.id(), added, reordered = self.reordered, "merged remote pack");
        MergeStatus::Updated { added }
    }
}

/// Number of leading operations two packs have in common.
fn common_prefix(a: &[Operation], b: &[Operation]) -> usize {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x.id() == y.id())
        .count()
}

fn causal_order(a: &Operation, b: &Operation) -> Ordering {
    a.timestamp()
        .cmp(&b.timestamp())
        .then_with(|| a.id().cmp(b.id()))
}

impl Entity for Bug {
    fn operations(&self) -> &[Operation] {
        &self.ops
    }

    fn append(&mut self, op: Operation) {
        self.ops.push(op);
    }
}
