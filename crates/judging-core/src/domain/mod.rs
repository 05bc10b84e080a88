//! Domain models for the judging system.
//!
//! Canonical definitions for the core entities:
//! - `Contest` / `Entry`: read-only snapshots from the source or the mirror
//! - `RubricScore`: running per-entry aggregate of judge scores
//! - `IncomingScores`: one judge's submission

pub mod contest;
pub mod ids;
pub mod rubric;

pub use contest::{contest_from_tree, entry_from_tree, Contest, ContestSet, Entry, EntryScores};
pub use ids::{ContestId, EntryId, JudgeId};
pub use rubric::{
    Criterion, FoldError, IncomingScores, RubricCriterion, RubricDefinition, RubricScore,
};
