//! Judging Core Library
//!
//! Contest reconciliation between the upstream contest source and the
//! mirror, plus per-entry rubric score aggregation.

pub mod completion;
pub mod config;
pub mod domain;
pub mod judges;
pub mod metrics;
pub mod mirror;
pub mod obs;
pub mod reconcile;
pub mod sampling;
pub mod score;
pub mod source;
pub mod telemetry;

pub use completion::{Completer, CompletionWaiter, WaitError};

pub use config::{ConfigError, JudgingConfig};

pub use domain::{
    Contest, ContestId, ContestSet, Criterion, Entry, EntryId, IncomingScores, JudgeId,
    RubricCriterion, RubricDefinition, RubricScore,
};

pub use judges::{AllowedJudge, JudgeAllowList, JudgeAuthorizer};

pub use metrics::Metrics;

pub use mirror::{get_rubrics, load_contest, load_entry, read_mirrored_contests, MirrorError};

pub use reconcile::{
    apply_diff_plan, reconcile, ApplyReport, DiffPlan, FetchSide, PlanSummary, SyncError,
    SyncReport, SyncService, WriteFailure, WriteTarget,
};

pub use sampling::{sample_entries, sample_entries_from_store};

pub use score::{ScoreAggregator, VoteError};

pub use source::{ContestSource, HttpContestSource, SourceError, StaticContestSource};

pub use telemetry::init_tracing;

pub use judging_state::{MirrorStore, StorePath};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
