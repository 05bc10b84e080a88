//! Rubric score aggregation.
//!
//! [`ScoreAggregator::judge_entry`] folds one judge's scores into an entry's
//! running rubric. Calls for the same entry are serialized, so the read,
//! the fold and the write of one vote never interleave with another vote on
//! that entry and no vote is lost. The new rubric (including the voter set)
//! is written back as one replacement of `scores/rubric`.

mod error;
mod locks;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use judging_state::MirrorStore;
use tracing::{instrument, warn, Instrument};

pub use error::VoteError;
use locks::EntryLocks;

use crate::completion::{Completer, CompletionWaiter};
use crate::config::JudgingConfig;
use crate::domain::{
    ContestId, Criterion, Entry, EntryId, FoldError, IncomingScores, JudgeId, RubricDefinition,
    RubricScore,
};
use crate::judges::JudgeAuthorizer;
use crate::metrics::Metrics;
use crate::mirror::{get_rubrics, load_entry, paths, to_tree, MirrorError};
use crate::obs;

const ENTRY: &str = "entry";
const RUBRICS: &str = "rubrics";

enum VoteRead {
    Entry(Result<Option<Entry>, MirrorError>),
    Rubrics(Result<BTreeMap<Criterion, RubricDefinition>, MirrorError>),
}

/// Records judge votes against the mirror.
pub struct ScoreAggregator {
    store: Arc<dyn MirrorStore>,
    authorizer: Arc<dyn JudgeAuthorizer>,
    locks: EntryLocks,
    read_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl ScoreAggregator {
    pub fn new(
        store: Arc<dyn MirrorStore>,
        authorizer: Arc<dyn JudgeAuthorizer>,
        config: &JudgingConfig,
    ) -> Self {
        Self {
            store,
            authorizer,
            locks: EntryLocks::default(),
            read_timeout: config.fetch_timeout,
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

    /// Record `judge`'s scores for one entry and return the updated rubric.
    ///
    /// The allow-list is checked before anything else. A judge who already
    /// voted gets [`VoteError::AlreadyVoted`] and the stored rubric is left
    /// untouched.
    #[instrument(skip(self, incoming), fields(contest = %contest, entry = %entry, judge = %judge))]
    pub async fn judge_entry(
        &self,
        contest: &ContestId,
        entry: &EntryId,
        judge: &JudgeId,
        incoming: IncomingScores,
    ) -> Result<RubricScore, VoteError> {
        let result = self.record_vote(contest, entry, judge, &incoming).await;

        match &result {
            Ok(rubric) => {
                self.metrics.inc_votes_recorded();
                obs::emit_vote_recorded(
                    contest.as_str(),
                    entry.as_str(),
                    judge.as_str(),
                    rubric.number_of_judges,
                );
            }
            Err(e) => {
                if e.is_rejection() {
                    self.metrics.inc_votes_rejected();
                }
                obs::emit_vote_rejected(contest.as_str(), entry.as_str(), judge.as_str(), e);
            }
        }
        result
    }

    async fn record_vote(
        &self,
        contest: &ContestId,
        entry: &EntryId,
        judge: &JudgeId,
        incoming: &IncomingScores,
    ) -> Result<RubricScore, VoteError> {
        if !self
            .authorizer
            .is_judge_allowed(judge)
            .await
            .map_err(VoteError::Authorization)?
        {
            return Err(VoteError::Unauthorized {
                judge: judge.clone(),
            });
        }

        let _guard = self.locks.acquire(contest, entry).await;

        let (current, rubrics) = self.read_vote_state(contest, entry).await?;
        let current = current.scores.rubric;

        if current.has_voted(judge) {
            return Err(VoteError::AlreadyVoted {
                contest: contest.clone(),
                entry: entry.clone(),
                judge: judge.clone(),
            });
        }
        if !current.is_consistent() {
            warn!(
                number_of_judges = current.number_of_judges,
                voters = current.judges_who_voted.len(),
                "stored rubric judge count disagrees with its voter set"
            );
        }

        validate(incoming, &rubrics)?;

        let next = current.with_vote(judge, incoming).map_err(|e| match e {
            FoldError::AlreadyVoted => VoteError::AlreadyVoted {
                contest: contest.clone(),
                entry: entry.clone(),
                judge: judge.clone(),
            },
            FoldError::Overflow { criterion } => VoteError::InvalidScore {
                criterion,
                value: incoming.get(criterion),
                reason: e.to_string(),
            },
        })?;

        let write_failed = |source| VoteError::Write {
            contest: contest.clone(),
            entry: entry.clone(),
            source,
        };
        let path = paths::rubric_score(contest, entry).map_err(write_failed)?;
        let body = to_tree(&next).map_err(write_failed)?;
        self.store
            .set(&path, Some(body))
            .await
            .map_err(write_failed)?;

        Ok(next)
    }

    /// Read the entry and the rubric definitions concurrently.
    async fn read_vote_state(
        &self,
        contest: &ContestId,
        entry: &EntryId,
    ) -> Result<(Entry, BTreeMap<Criterion, RubricDefinition>), VoteError> {
        let waiter = CompletionWaiter::new(self.read_timeout);
        let entry_done = waiter.register(ENTRY)?;
        let rubrics_done = waiter.register(RUBRICS)?;

        let store = Arc::clone(&self.store);
        let (contest_id, entry_id) = (contest.clone(), entry.clone());
        let read_entry = tokio::spawn(
            async move {
                let loaded = load_entry(store.as_ref(), &contest_id, &entry_id).await;
                let failed = loaded.is_err();
                report_read(&entry_done, VoteRead::Entry(loaded), failed);
            }
            .in_current_span(),
        );

        let store = Arc::clone(&self.store);
        let read_rubrics = tokio::spawn(
            async move {
                let loaded = get_rubrics(store.as_ref()).await;
                let failed = loaded.is_err();
                report_read(&rubrics_done, VoteRead::Rubrics(loaded), failed);
            }
            .in_current_span(),
        );

        let outcome = waiter.wait().await;
        read_entry.abort();
        read_rubrics.abort();

        let mut loaded_entry = None;
        let mut rubrics = None;
        for (_, read) in outcome? {
            match read {
                VoteRead::Entry(result) => loaded_entry = Some(result.map_err(VoteError::Read)?),
                VoteRead::Rubrics(result) => rubrics = Some(result.map_err(VoteError::Read)?),
            }
        }
        let rubrics = rubrics.ok_or_else(|| VoteError::Aborted {
            reason: format!("{RUBRICS} read did not report"),
        })?;

        let not_found = || VoteError::EntryNotFound {
            contest: contest.clone(),
            entry: entry.clone(),
        };
        let current = loaded_entry
            .ok_or_else(|| VoteError::Aborted {
                reason: format!("{ENTRY} read did not report"),
            })?
            .ok_or_else(not_found)?;
        Ok((current, rubrics))
    }
}

/// A failed read ends the wait at once.
fn report_read(completer: &Completer<VoteRead>, read: VoteRead, failed: bool) {
    if failed {
        completer.fail(read);
    } else {
        completer.complete(read);
    }
}

/// Check each incoming value against its rubric's bounds, when defined.
fn validate(
    incoming: &IncomingScores,
    rubrics: &BTreeMap<Criterion, RubricDefinition>,
) -> Result<(), VoteError> {
    for criterion in Criterion::ALL {
        let value = incoming.get(criterion);
        if let Some(reason) = rubrics.get(&criterion).and_then(|def| def.violation(value)) {
            return Err(VoteError::InvalidScore {
                criterion,
                value,
                reason,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(level: i64, clean: i64, creativity: i64, overall: i64) -> IncomingScores {
        IncomingScores {
            level,
            clean_code: clean,
            creativity,
            overall,
        }
    }

    #[test]
    fn validation_uses_defined_bounds_only() {
        let rubrics = BTreeMap::from([(
            Criterion::Creativity,
            RubricDefinition {
                min: Some(1),
                max: Some(5),
            },
        )]);

        assert!(validate(&scores(100, -3, 4, 0), &rubrics).is_ok());
        assert_eq!(
            validate(&scores(1, 1, 9, 1), &rubrics),
            Err(VoteError::InvalidScore {
                criterion: Criterion::Creativity,
                value: 9,
                reason: "above maximum 5".into(),
            })
        );
    }

    #[test]
    fn rejections_are_distinguished_from_failures() {
        assert!(VoteError::Unauthorized {
            judge: "u1".into()
        }
        .is_rejection());
        assert!(!VoteError::Aborted {
            reason: "x".into()
        }
        .is_rejection());
    }
}
