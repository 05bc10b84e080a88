//! Typed access to the mirrored contest tree.
//!
//! Layout:
//!
//! ```text
//! contests/{contest_id}                          Contest
//! contests/{contest_id}/entries/{entry_id}       Entry
//! contests/{contest_id}/entries/{entry_id}/scores/rubric
//! rubrics/{criterion}                            RubricDefinition
//! allowedJudges/{push_id}                        {uid, allowed}
//! loggedInJudges/{uid}                           login record
//! ```

use std::collections::BTreeMap;
use std::fmt;

use judging_state::{MirrorStore, StorageError, StorePath};
use serde_json::Value;
use tracing::debug;

use crate::domain::{
    contest_from_tree, entry_from_tree, Contest, ContestId, ContestSet, Criterion, Entry, EntryId,
    RubricDefinition,
};

/// Errors reading or decoding mirrored data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MirrorError {
    #[error("mirror access failed at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("malformed mirror data at {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("nothing stored at {path}")]
    NotFound { path: String },
}

impl MirrorError {
    fn storage(path: &StorePath, source: StorageError) -> Self {
        MirrorError::Storage {
            path: path.to_string(),
            source,
        }
    }

    fn decode(path: impl fmt::Display, err: serde_json::Error) -> Self {
        MirrorError::Decode {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<StorageError> for MirrorError {
    fn from(source: StorageError) -> Self {
        let path = match &source {
            StorageError::InvalidPath { path, .. } => path.clone(),
            _ => String::new(),
        };
        MirrorError::Storage { path, source }
    }
}

/// Well-known mirror paths.
pub mod paths {
    use super::*;

    pub const CONTESTS: &str = "contests";
    pub const RUBRICS: &str = "rubrics";
    pub const ALLOWED_JUDGES: &str = "allowedJudges";
    pub const LOGGED_IN_JUDGES: &str = "loggedInJudges";

    pub fn contests() -> Result<StorePath, StorageError> {
        StorePath::root(CONTESTS)
    }

    pub fn contest(contest: &ContestId) -> Result<StorePath, StorageError> {
        contests()?.child(contest.as_str())
    }

    pub fn entries(contest: &ContestId) -> Result<StorePath, StorageError> {
        self::contest(contest)?.child("entries")
    }

    pub fn entry(contest: &ContestId, entry: &EntryId) -> Result<StorePath, StorageError> {
        entries(contest)?.child(entry.as_str())
    }

    pub fn rubric_score(contest: &ContestId, entry: &EntryId) -> Result<StorePath, StorageError> {
        self::entry(contest, entry)?.child("scores")?.child("rubric")
    }

    pub fn rubrics() -> Result<StorePath, StorageError> {
        StorePath::root(RUBRICS)
    }

    pub fn allowed_judges() -> Result<StorePath, StorageError> {
        StorePath::root(ALLOWED_JUDGES)
    }

    pub fn logged_in_judge(uid: &str) -> Result<StorePath, StorageError> {
        StorePath::root(LOGGED_IN_JUDGES)?.child(uid)
    }
}

/// Every contest currently in the mirror.
pub async fn read_mirrored_contests(store: &dyn MirrorStore) -> Result<ContestSet, MirrorError> {
    let path = paths::contests()?;
    let children = store
        .list(&path)
        .await
        .map_err(|e| MirrorError::storage(&path, e))?;

    let mut contests = ContestSet::new();
    for (key, value) in children {
        let contest = contest_from_tree(&key, value)
            .map_err(|e| MirrorError::decode(format!("{path}/{key}"), e))?;
        contests.insert(ContestId::new(key), contest);
    }
    debug!(contests = contests.len(), "read mirrored contests");
    Ok(contests)
}

/// Load one contest, `None` if it is not mirrored.
pub async fn load_contest(
    store: &dyn MirrorStore,
    contest: &ContestId,
) -> Result<Option<Contest>, MirrorError> {
    let path = paths::contest(contest)?;
    match store
        .get(&path)
        .await
        .map_err(|e| MirrorError::storage(&path, e))?
    {
        Some(value) => contest_from_tree(contest.as_str(), value)
            .map(Some)
            .map_err(|e| MirrorError::decode(&path, e)),
        None => Ok(None),
    }
}

/// Load one entry, `None` if it is not mirrored.
pub async fn load_entry(
    store: &dyn MirrorStore,
    contest: &ContestId,
    entry: &EntryId,
) -> Result<Option<Entry>, MirrorError> {
    let path = paths::entry(contest, entry)?;
    match store
        .get(&path)
        .await
        .map_err(|e| MirrorError::storage(&path, e))?
    {
        Some(value) => entry_from_tree(entry.as_str(), value)
            .map(Some)
            .map_err(|e| MirrorError::decode(&path, e)),
        None => Ok(None),
    }
}

/// Rubric definitions keyed by criterion. Keys that are not one of the
/// four fixed criteria are skipped.
pub async fn get_rubrics(
    store: &dyn MirrorStore,
) -> Result<BTreeMap<Criterion, RubricDefinition>, MirrorError> {
    let path = paths::rubrics()?;
    let children = store
        .list(&path)
        .await
        .map_err(|e| MirrorError::storage(&path, e))?;

    let mut rubrics = BTreeMap::new();
    for (key, value) in children {
        let Some(criterion) = Criterion::from_name(&key) else {
            debug!(rubric = %key, "skipping rubric outside the fixed criteria");
            continue;
        };
        let definition: RubricDefinition = serde_json::from_value(value)
            .map_err(|e| MirrorError::decode(format!("{path}/{key}"), e))?;
        rubrics.insert(criterion, definition);
    }
    Ok(rubrics)
}

/// Encode `value` for a mirror write.
pub(crate) fn to_tree<T: serde::Serialize>(value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(StorageError::from)
}
