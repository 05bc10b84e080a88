//! Authoritative contest source.
//!
//! The upstream contest site is the source of truth for which contests and
//! entries exist. [`HttpContestSource`] fetches the full set in one request;
//! [`StaticContestSource`] serves a fixed set for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::JudgingConfig;
use crate::domain::{contest_from_tree, ContestId, ContestSet};

/// Errors fetching from the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("upstream returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed contest payload: {0}")]
    Decode(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

/// One-shot fetch of every contest the upstream knows about.
#[async_trait]
pub trait ContestSource: Send + Sync {
    async fn fetch_contests(&self) -> Result<ContestSet, SourceError>;
}

/// Decode a `{contest_id: contest}` payload.
pub fn decode_contest_set(body: &str) -> Result<ContestSet, SourceError> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(body)?;
    let mut contests = ContestSet::new();
    for (key, value) in raw {
        let contest = contest_from_tree(&key, value)
            .map_err(|e| SourceError::Decode(format!("contest {key}: {e}")))?;
        contests.insert(ContestId::new(key), contest);
    }
    Ok(contests)
}

/// Fetches `GET {base_url}/contests`.
pub struct HttpContestSource {
    base_url: String,
    timeout: Option<Duration>,
    http_client: reqwest::Client,
}

impl HttpContestSource {
    /// `timeout` bounds each request; `None` leaves requests unbounded.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, SourceError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("judging-core/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            http_client,
        })
    }

    /// Source at `config.source_url`, with requests bounded by the same
    /// deadline as the fetch barrier.
    pub fn from_config(config: &JudgingConfig) -> Result<Self, SourceError> {
        Self::new(config.source_url.clone(), config.fetch_timeout)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn contests_url(&self) -> String {
        format!("{}/contests", self.base_url)
    }
}

#[async_trait]
impl ContestSource for HttpContestSource {
    #[instrument(skip(self), fields(url = %self.contests_url()))]
    async fn fetch_contests(&self) -> Result<ContestSet, SourceError> {
        let url = self.contests_url();
        let response = self.http_client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let contests = decode_contest_set(&body)?;
        info!(contests = contests.len(), "fetched upstream contests");
        Ok(contests)
    }
}

/// In-memory source returning a configured set (or failure).
pub struct StaticContestSource {
    response: Mutex<Result<ContestSet, SourceError>>,
    delay: Option<Duration>,
    fetches: AtomicU64,
}

impl Default for StaticContestSource {
    fn default() -> Self {
        Self::new(ContestSet::new())
    }
}

impl StaticContestSource {
    pub fn new(contests: ContestSet) -> Self {
        Self {
            response: Mutex::new(Ok(contests)),
            delay: None,
            fetches: AtomicU64::new(0),
        }
    }

    /// A source whose every fetch fails with `error`.
    pub fn failing(error: SourceError) -> Self {
        Self {
            response: Mutex::new(Err(error)),
            delay: None,
            fetches: AtomicU64::new(0),
        }
    }

    /// Sleep for `delay` before answering each fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_contests(&self, contests: ContestSet) {
        *self.response.lock().unwrap_or_else(PoisonError::into_inner) = Ok(contests);
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContestSource for StaticContestSource {
    async fn fetch_contests(&self) -> Result<ContestSet, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        debug!("serving static contests");
        self.response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
