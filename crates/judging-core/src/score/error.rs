use std::time::Duration;

use judging_state::StorageError;

use crate::completion::WaitError;
use crate::domain::{ContestId, Criterion, EntryId, JudgeId};
use crate::mirror::MirrorError;

/// Why a vote was not recorded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    #[error("judge {judge} is not on the allow-list")]
    Unauthorized { judge: JudgeId },

    #[error("could not check the allow-list: {0}")]
    Authorization(#[source] MirrorError),

    #[error("judge {judge} has already voted on entry {contest}/{entry}")]
    AlreadyVoted {
        contest: ContestId,
        entry: EntryId,
        judge: JudgeId,
    },

    #[error("entry {contest}/{entry} is not mirrored")]
    EntryNotFound { contest: ContestId, entry: EntryId },

    #[error("invalid {criterion} score {value}: {reason}")]
    InvalidScore {
        criterion: Criterion,
        value: i64,
        reason: String,
    },

    #[error("failed to read vote state: {0}")]
    Read(#[source] MirrorError),

    #[error("failed to write rubric for {contest}/{entry}: {source}")]
    Write {
        contest: ContestId,
        entry: EntryId,
        #[source]
        source: StorageError,
    },

    #[error("timed out after {after:?} reading {pending:?}")]
    Timeout {
        pending: Vec<String>,
        after: Duration,
    },

    #[error("vote aborted: {reason}")]
    Aborted { reason: String },
}

impl VoteError {
    /// Expected, non-fatal rejections that the judge should see as such
    /// (as opposed to infrastructure failures).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            VoteError::Unauthorized { .. }
                | VoteError::AlreadyVoted { .. }
                | VoteError::EntryNotFound { .. }
                | VoteError::InvalidScore { .. }
        )
    }
}

impl From<WaitError> for VoteError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout { pending, after } => VoteError::Timeout { pending, after },
            other => VoteError::Aborted {
                reason: other.to_string(),
            },
        }
    }
}
