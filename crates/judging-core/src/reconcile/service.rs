//! One reconciliation pass: fetch both sides, diff, apply.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use judging_state::MirrorStore;
use tracing::{debug, Instrument};
use uuid::Uuid;

use super::apply::{apply_diff_plan, WriteFailure};
use super::plan::{reconcile, DiffPlan, PlanSummary};
use crate::completion::{Completer, CompletionWaiter, WaitError};
use crate::config::JudgingConfig;
use crate::domain::ContestSet;
use crate::metrics::Metrics;
use crate::mirror::read_mirrored_contests;
use crate::obs::{self, PassSpan};
use crate::source::ContestSource;

const AUTHORITATIVE: &str = "authoritative";
const MIRROR: &str = "mirror";

/// Which side of a pass failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSide {
    Authoritative,
    Mirror,
}

impl fmt::Display for FetchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchSide::Authoritative => AUTHORITATIVE,
            FetchSide::Mirror => MIRROR,
        })
    }
}

/// Why a pass was abandoned. No mirror write happens in any of these cases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("failed to fetch {side} contests: {reason}")]
    Fetch { side: FetchSide, reason: String },

    #[error("timed out after {after:?} waiting for {pending:?}")]
    Timeout {
        pending: Vec<String>,
        after: Duration,
    },

    #[error("sync pass aborted: {reason}")]
    Aborted { reason: String },
}

impl From<WaitError> for SyncError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout { pending, after } => SyncError::Timeout { pending, after },
            other => SyncError::Aborted {
                reason: other.to_string(),
            },
        }
    }
}

/// Result of a completed pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub pass_id: String,
    pub plan: PlanSummary,
    /// Writes that succeeded.
    pub applied: usize,
    /// Writes that failed; the rest of the plan was still applied.
    pub failures: Vec<WriteFailure>,
    /// The source's contest set this pass converged towards.
    pub authoritative: ContestSet,
}

type Fetched = Result<ContestSet, String>;

/// Runs reconciliation passes between a contest source and the mirror.
pub struct SyncService {
    source: Arc<dyn ContestSource>,
    store: Arc<dyn MirrorStore>,
    fetch_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn ContestSource>,
        store: Arc<dyn MirrorStore>,
        config: &JudgingConfig,
    ) -> Self {
        Self {
            source,
            store,
            fetch_timeout: config.fetch_timeout,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Share counters with other services.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Fetch both sides and compute the plan without writing anything.
    pub async fn plan(&self) -> Result<DiffPlan, SyncError> {
        let (authoritative, mirrored) = self.fetch_both().await?;
        Ok(reconcile(&authoritative, &mirrored))
    }

    /// Run one full pass.
    ///
    /// A failure to load either side aborts the pass before any write. Once
    /// the plan is applied, individual write failures are reported in the
    /// [`SyncReport`] rather than failing the pass.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let pass_id = Uuid::new_v4().to_string();
        self.run_pass(&pass_id)
            .instrument(PassSpan::span(&pass_id))
            .await
    }

    async fn run_pass(&self, pass_id: &str) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        obs::emit_sync_started(pass_id);

        let (authoritative, mirrored) = match self.fetch_both().await {
            Ok(sides) => sides,
            Err(e) => {
                obs::emit_sync_aborted(pass_id, &e);
                return Err(e);
            }
        };

        let plan = reconcile(&authoritative, &mirrored);
        let summary = plan.summary();
        debug!(?summary, "computed diff plan");

        let report = apply_diff_plan(&plan, self.store.as_ref()).await;
        for failure in &report.failures {
            obs::emit_sync_write_failed(pass_id, &failure.target.to_string(), &failure.error);
        }
        self.metrics.record_pass(&summary, report.failures.len());
        obs::emit_sync_finished(
            pass_id,
            started.elapsed().as_millis() as u64,
            summary.total(),
            report.failures.len(),
        );

        Ok(SyncReport {
            pass_id: pass_id.to_string(),
            plan: summary,
            applied: report.applied,
            failures: report.failures,
            authoritative,
        })
    }

    /// Load the source and the mirror concurrently, joined by a
    /// [`CompletionWaiter`] with the configured deadline.
    async fn fetch_both(&self) -> Result<(ContestSet, ContestSet), SyncError> {
        let waiter: CompletionWaiter<Fetched> = CompletionWaiter::new(self.fetch_timeout);
        let upstream = waiter.register(AUTHORITATIVE)?;
        let mirror = waiter.register(MIRROR)?;

        let source = Arc::clone(&self.source);
        let fetch_upstream = tokio::spawn(
            async move {
                let fetched = source.fetch_contests().await.map_err(|e| e.to_string());
                report_fetch(&upstream, fetched);
            }
            .in_current_span(),
        );

        let store = Arc::clone(&self.store);
        let fetch_mirror = tokio::spawn(
            async move {
                let fetched = read_mirrored_contests(store.as_ref())
                    .await
                    .map_err(|e| e.to_string());
                report_fetch(&mirror, fetched);
            }
            .in_current_span(),
        );

        let outcome = waiter.wait().await;
        // Late fetches are discarded.
        fetch_upstream.abort();
        fetch_mirror.abort();

        let mut results = outcome?;
        for side in [FetchSide::Authoritative, FetchSide::Mirror] {
            if let Some(Err(reason)) = results.get(&side.to_string()) {
                return Err(SyncError::Fetch {
                    side,
                    reason: reason.clone(),
                });
            }
        }
        let authoritative = take_side(&mut results, FetchSide::Authoritative)?;
        let mirrored = take_side(&mut results, FetchSide::Mirror)?;
        debug!(
            authoritative = authoritative.len(),
            mirrored = mirrored.len(),
            "fetched both sides"
        );
        Ok((authoritative, mirrored))
    }
}

/// A failed side ends the wait at once; the pass is aborted either way.
fn report_fetch(completer: &Completer<Fetched>, fetched: Fetched) {
    if fetched.is_ok() {
        completer.complete(fetched);
    } else {
        completer.fail(fetched);
    }
}

fn take_side(
    results: &mut std::collections::BTreeMap<String, Fetched>,
    side: FetchSide,
) -> Result<ContestSet, SyncError> {
    let name = side.to_string();
    match results.remove(&name) {
        Some(Ok(contests)) => Ok(contests),
        Some(Err(reason)) => Err(SyncError::Fetch { side, reason }),
        None => Err(SyncError::Aborted {
            reason: format!("{name} fetch did not report"),
        }),
    }
}
