//! Judge allow-list and login records.
//!
//! Judges are authorized by an `allowedJudges` collection of pushed
//! `{uid, allowed}` records. A judge is allowed iff at least one record
//! names them with `allowed == true`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use judging_state::MirrorStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use crate::domain::JudgeId;
use crate::mirror::{paths, to_tree, MirrorError};

/// One record under `allowedJudges`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedJudge {
    pub uid: JudgeId,
    #[serde(default)]
    pub allowed: bool,
}

/// Boolean authorization predicate consumed by the score aggregator.
#[async_trait]
pub trait JudgeAuthorizer: Send + Sync {
    async fn is_judge_allowed(&self, judge: &JudgeId) -> Result<bool, MirrorError>;
}

/// Allow-list stored in the mirror.
#[derive(Clone)]
pub struct JudgeAllowList {
    store: Arc<dyn MirrorStore>,
}

impl JudgeAllowList {
    pub fn new(store: Arc<dyn MirrorStore>) -> Self {
        Self { store }
    }

    /// Every decodable record, keyed by push id. Malformed records are skipped.
    pub async fn allowed_judges(&self) -> Result<Vec<(String, AllowedJudge)>, MirrorError> {
        let path = paths::allowed_judges()?;
        let records = self.store.list(&path).await.map_err(|source| MirrorError::Storage {
            path: path.to_string(),
            source,
        })?;

        Ok(records
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<AllowedJudge>(value) {
                Ok(record) => Some((key, record)),
                Err(e) => {
                    debug!(record = %key, error = %e, "skipping malformed allow-list record");
                    None
                }
            })
            .collect())
    }

    /// Grant `judge` access by pushing a new `{uid, allowed: true}` record.
    /// Returns the generated record key.
    #[instrument(skip(self), fields(judge = %judge))]
    pub async fn add_allowed_judge(&self, judge: &JudgeId) -> Result<String, MirrorError> {
        let path = paths::allowed_judges()?;
        let record = to_tree(&AllowedJudge {
            uid: judge.clone(),
            allowed: true,
        })?;
        let key = self
            .store
            .push(&path, record)
            .await
            .map_err(|source| MirrorError::Storage {
                path: path.to_string(),
                source,
            })?;
        info!(record = %key, "judge added to allow-list");
        Ok(key)
    }

    /// Store the identity provider's profile for a judge who just signed in,
    /// stamped with the login time.
    #[instrument(skip(self, profile), fields(judge = %judge))]
    pub async fn record_login(
        &self,
        judge: &JudgeId,
        profile: Map<String, Value>,
    ) -> Result<(), MirrorError> {
        let path = paths::logged_in_judge(judge.as_str())?;
        let mut record = profile;
        record.insert("uid".to_string(), json!(judge));
        record.insert("loggedInAt".to_string(), json!(Utc::now().to_rfc3339()));

        self.store
            .set(&path, Some(Value::Object(record)))
            .await
            .map_err(|source| MirrorError::Storage {
                path: path.to_string(),
                source,
            })
    }
}

#[async_trait]
impl JudgeAuthorizer for JudgeAllowList {
    async fn is_judge_allowed(&self, judge: &JudgeId) -> Result<bool, MirrorError> {
        let allowed = self
            .allowed_judges()
            .await?
            .iter()
            .any(|(_, record)| record.allowed && &record.uid == judge);
        debug!(judge = %judge, allowed, "checked allow-list");
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use judging_state::fakes::MemoryMirrorStore;

    fn allow_list(tree: Value) -> (Arc<MemoryMirrorStore>, JudgeAllowList) {
        let store = Arc::new(MemoryMirrorStore::with_tree(tree));
        let list = JudgeAllowList::new(store.clone());
        (store, list)
    }

    #[tokio::test]
    async fn allowed_requires_matching_uid_and_flag() {
        let (_, list) = allow_list(json!({
            "allowedJudges": {
                "k1": {"uid": "u1", "allowed": true},
                "k2": {"uid": "u2", "allowed": false},
                "k3": {"allowed": true},
                "k4": {"uid": 42, "allowed": true}
            }
        }));

        assert!(list.is_judge_allowed(&JudgeId::from("u1")).await.unwrap());
        assert!(!list.is_judge_allowed(&JudgeId::from("u2")).await.unwrap());
        assert!(!list.is_judge_allowed(&JudgeId::from("u9")).await.unwrap());
        assert!(list.is_judge_allowed(&JudgeId::from("42")).await.unwrap());
    }

    #[tokio::test]
    async fn added_judge_becomes_allowed() {
        let (store, list) = allow_list(json!({}));
        let judge = JudgeId::from("u7");
        assert!(!list.is_judge_allowed(&judge).await.unwrap());

        let key = list.add_allowed_judge(&judge).await.unwrap();
        assert!(list.is_judge_allowed(&judge).await.unwrap());
        assert_eq!(
            store.snapshot()["allowedJudges"][&key],
            json!({"uid": "u7", "allowed": true})
        );
    }

    #[tokio::test]
    async fn login_record_keeps_profile_and_stamps_time() {
        let (store, list) = allow_list(json!({}));
        let mut profile = Map::new();
        profile.insert("provider".into(), json!("google"));

        list.record_login(&JudgeId::from("u1"), profile).await.unwrap();

        let record = &store.snapshot()["loggedInJudges"]["u1"];
        assert_eq!(record["provider"], json!("google"));
        assert_eq!(record["uid"], json!("u1"));
        assert!(record["loggedInAt"].is_string());
    }
}
