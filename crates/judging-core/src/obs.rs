//! Structured observability hooks for sync passes and votes.
//!
//! This module provides:
//! - Pass-scoped tracing spans via the `PassSpan` RAII guard
//! - Emission functions for lifecycle events: pass start/finish, failed
//!   mirror writes, recorded and rejected votes
//!
//! Events are emitted at `info!` level (`warn!` for failures). Set
//! `RUST_LOG` to filter and pass `--json` to the binaries for JSON lines.

use tracing::{info, warn};

/// RAII guard that enters a pass-scoped tracing span.
///
/// Only hold this in synchronous code; async callers attach the span with
/// `tracing::Instrument` instead (see [`PassSpan::span`]).
pub struct PassSpan {
    _span: tracing::span::EnteredSpan,
}

impl PassSpan {
    /// Create and enter a span tagged with the pass id.
    pub fn enter(pass_id: &str) -> Self {
        Self {
            _span: Self::span(pass_id).entered(),
        }
    }

    /// The span itself, for instrumenting futures.
    pub fn span(pass_id: &str) -> tracing::Span {
        tracing::info_span!("judging.sync", pass_id = %pass_id)
    }
}

/// Emit event: sync pass started.
pub fn emit_sync_started(pass_id: &str) {
    info!(event = "sync.started", pass_id = %pass_id);
}

/// Emit event: sync pass finished with its plan size and failure count.
pub fn emit_sync_finished(
    pass_id: &str,
    duration_ms: u64,
    operations: usize,
    write_failures: usize,
) {
    info!(
        event = "sync.finished",
        pass_id = %pass_id,
        duration_ms = duration_ms,
        operations = operations,
        write_failures = write_failures,
        success = write_failures == 0,
    );
}

/// Emit event: one mirror write of a pass failed (warning level).
pub fn emit_sync_write_failed(pass_id: &str, key: &str, error: &dyn std::fmt::Display) {
    warn!(event = "sync.write_failed", pass_id = %pass_id, key = %key, error = %error);
}

/// Emit event: sync pass aborted before any write (warning level).
pub fn emit_sync_aborted(pass_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "sync.aborted", pass_id = %pass_id, error = %error);
}

/// Emit event: a vote was folded into an entry's rubric.
pub fn emit_vote_recorded(contest: &str, entry: &str, judge: &str, number_of_judges: u32) {
    info!(
        event = "vote.recorded",
        contest = %contest,
        entry = %entry,
        judge = %judge,
        number_of_judges = number_of_judges,
    );
}

/// Emit event: a vote was rejected (unauthorized, repeat, invalid, ...).
pub fn emit_vote_rejected(contest: &str, entry: &str, judge: &str, reason: &dyn std::fmt::Display) {
    warn!(
        event = "vote.rejected",
        contest = %contest,
        entry = %entry,
        judge = %judge,
        reason = %reason,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_span_create() {
        let _span = PassSpan::enter("pass-1");
        emit_sync_started("pass-1");
        emit_sync_finished("pass-1", 3, 2, 0);
    }
}
