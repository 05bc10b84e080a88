//! Contest reconciliation between the upstream source and the mirror.
//!
//! - [`reconcile`]: pure diff of two contest sets into a [`DiffPlan`]
//! - [`apply_diff_plan`]: issue the plan's writes concurrently, isolating failures
//! - [`SyncService`]: a full pass (fetch both sides, diff, apply)

mod apply;
mod plan;
mod service;

pub use apply::{apply_diff_plan, ApplyReport, WriteAction, WriteFailure, WriteTarget};
pub use plan::{reconcile, DiffPlan, PlanSummary};
pub use service::{FetchSide, SyncError, SyncReport, SyncService};
