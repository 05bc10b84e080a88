//! Atomic counters for sync passes and votes.
//!
//! Each service owns (or shares) a [`Metrics`] instance; counters are
//! incremented silently at the call site. Call [`Metrics::flush`] to emit
//! the current values as a single `tracing::info!` event (e.g. after each
//! daemon tick).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::reconcile::PlanSummary;

/// Lightweight atomic counters, no allocations and no locking.
#[derive(Debug, Default)]
pub struct Metrics {
    sync_passes: AtomicU64,
    contests_added: AtomicU64,
    contests_removed: AtomicU64,
    entries_added: AtomicU64,
    entries_removed: AtomicU64,
    write_failures: AtomicU64,
    votes_recorded: AtomicU64,
    votes_rejected: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sync_passes: AtomicU64::new(0),
            contests_added: AtomicU64::new(0),
            contests_removed: AtomicU64::new(0),
            entries_added: AtomicU64::new(0),
            entries_removed: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            votes_recorded: AtomicU64::new(0),
            votes_rejected: AtomicU64::new(0),
        }
    }

    /// Record one completed sync pass and the plan it applied.
    pub fn record_pass(&self, plan: &PlanSummary, write_failures: usize) {
        self.sync_passes.fetch_add(1, Ordering::Relaxed);
        self.contests_added
            .fetch_add(plan.contests_added as u64, Ordering::Relaxed);
        self.contests_removed
            .fetch_add(plan.contests_removed as u64, Ordering::Relaxed);
        self.entries_added
            .fetch_add(plan.entries_added as u64, Ordering::Relaxed);
        self.entries_removed
            .fetch_add(plan.entries_removed as u64, Ordering::Relaxed);
        self.write_failures
            .fetch_add(write_failures as u64, Ordering::Relaxed);
        tracing::trace!(metric = "sync_passes", "counter incremented");
    }

    pub fn inc_votes_recorded(&self) {
        self.votes_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "votes_recorded", "counter incremented");
    }

    pub fn inc_votes_rejected(&self) {
        self.votes_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "votes_rejected", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sync_passes = self.sync_passes(),
            contests_added = self.contests_added(),
            contests_removed = self.contests_removed(),
            entries_added = self.entries_added(),
            entries_removed = self.entries_removed(),
            write_failures = self.write_failures(),
            votes_recorded = self.votes_recorded(),
            votes_rejected = self.votes_rejected(),
        );
    }

    pub fn sync_passes(&self) -> u64 {
        self.sync_passes.load(Ordering::Relaxed)
    }

    pub fn contests_added(&self) -> u64 {
        self.contests_added.load(Ordering::Relaxed)
    }

    pub fn contests_removed(&self) -> u64 {
        self.contests_removed.load(Ordering::Relaxed)
    }

    pub fn entries_added(&self) -> u64 {
        self.entries_added.load(Ordering::Relaxed)
    }

    pub fn entries_removed(&self) -> u64 {
        self.entries_removed.load(Ordering::Relaxed)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn votes_recorded(&self) -> u64 {
        self.votes_recorded.load(Ordering::Relaxed)
    }

    pub fn votes_rejected(&self) -> u64 {
        self.votes_rejected.load(Ordering::Relaxed)
    }
}
