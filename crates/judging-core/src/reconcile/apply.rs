//! Applying a [`DiffPlan`] to the mirror.

use std::fmt;

use futures::future::join_all;
use judging_state::{MirrorStore, StorageError, StorePath};
use serde_json::Value;
use tracing::{debug, warn};

use super::plan::DiffPlan;
use crate::domain::{ContestId, EntryId};
use crate::mirror::{paths, to_tree};

/// Key touched by one mirror write.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriteTarget {
    Contest { contest: ContestId },
    Entry { contest: ContestId, entry: EntryId },
}

impl WriteTarget {
    fn path(&self) -> Result<StorePath, StorageError> {
        match self {
            WriteTarget::Contest { contest } => paths::contest(contest),
            WriteTarget::Entry { contest, entry } => paths::entry(contest, entry),
        }
    }

    pub fn contest(&self) -> &ContestId {
        match self {
            WriteTarget::Contest { contest } | WriteTarget::Entry { contest, .. } => contest,
        }
    }
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Contest { contest } => write!(f, "contest {contest}"),
            WriteTarget::Entry { contest, entry } => write!(f, "entry {contest}/{entry}"),
        }
    }
}

/// One failed mirror write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to {action} {target}: {error}")]
pub struct WriteFailure {
    pub target: WriteTarget,
    pub action: WriteAction,
    #[source]
    pub error: StorageError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Put,
    Delete,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteAction::Put => "write",
            WriteAction::Delete => "delete",
        })
    }
}

/// Outcome of applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Writes that succeeded.
    pub applied: usize,
    /// Writes that failed, in target order.
    pub failures: Vec<WriteFailure>,
}

impl ApplyReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

struct WriteOp {
    target: WriteTarget,
    value: Option<Value>,
}

impl WriteOp {
    fn action(&self) -> WriteAction {
        if self.value.is_some() {
            WriteAction::Put
        } else {
            WriteAction::Delete
        }
    }
}

/// Flatten a plan into independent writes. Encoding failures are reported
/// immediately and do not stop the remaining writes.
fn write_ops(plan: &DiffPlan) -> (Vec<WriteOp>, Vec<WriteFailure>) {
    let mut ops = Vec::with_capacity(plan.operation_count());
    let mut failures = Vec::new();

    let mut put = |target: WriteTarget, encoded: Result<Value, StorageError>| match encoded {
        Ok(value) => ops.push(WriteOp {
            target,
            value: Some(value),
        }),
        Err(error) => failures.push(WriteFailure {
            target,
            action: WriteAction::Put,
            error,
        }),
    };

    for (contest, body) in &plan.contests_to_add {
        put(
            WriteTarget::Contest {
                contest: contest.clone(),
            },
            to_tree(body),
        );
    }
    for (contest, entries) in &plan.entries_to_add {
        for entry in entries {
            put(
                WriteTarget::Entry {
                    contest: contest.clone(),
                    entry: entry.id.clone(),
                },
                to_tree(entry),
            );
        }
    }

    for contest in &plan.contests_to_remove {
        ops.push(WriteOp {
            target: WriteTarget::Contest {
                contest: contest.clone(),
            },
            value: None,
        });
    }
    for (contest, entries) in &plan.entries_to_remove {
        for entry in entries {
            ops.push(WriteOp {
                target: WriteTarget::Entry {
                    contest: contest.clone(),
                    entry: entry.clone(),
                },
                value: None,
            });
        }
    }

    (ops, failures)
}

async fn execute(store: &dyn MirrorStore, op: WriteOp) -> Result<(), WriteFailure> {
    let action = op.action();
    let fail = |error| WriteFailure {
        target: op.target.clone(),
        action,
        error,
    };

    let path = op.target.path().map_err(fail)?;
    debug!(path = %path, %action, "applying mirror write");
    store.set(&path, op.value).await.map_err(fail)
}

/// Apply every operation of `plan` concurrently.
///
/// Operations touch disjoint keys, so they are issued together; a failed
/// write is recorded with its target and never blocks its siblings.
pub async fn apply_diff_plan(plan: &DiffPlan, store: &dyn MirrorStore) -> ApplyReport {
    let (ops, mut failures) = write_ops(plan);
    let results = join_all(ops.into_iter().map(|op| execute(store, op))).await;

    let mut applied = 0;
    for result in results {
        match result {
            Ok(()) => applied += 1,
            Err(failure) => {
                warn!(key = %failure.target, error = %failure.error, "mirror write failed");
                failures.push(failure);
            }
        }
    }
    failures.sort_by(|a, b| a.target.cmp(&b.target));

    ApplyReport { applied, failures }
}
