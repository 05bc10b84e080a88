//! Join barrier for independent asynchronous fetches.
//!
//! A [`CompletionWaiter`] hands out one [`Completer`] per named operation.
//! Each operation reports through its completer from wherever it runs; the
//! waiter resolves once every registered operation has reported, with the
//! results keyed by name.
//!
//! - Repeat reports from the same completer are ignored.
//! - A report made with [`Completer::fail`] resolves the wait right away with
//!   whatever has been reported so far.
//! - The results are delivered at most once.
//! - An optional deadline turns a hung operation into [`WaitError::Timeout`];
//!   reports arriving after that are discarded.
//! - If every outstanding completer is dropped without reporting, the wait
//!   fails with [`WaitError::Abandoned`] instead of hanging.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Errors produced while waiting on a [`CompletionWaiter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("timed out after {after:?} waiting for {pending:?}")]
    Timeout {
        pending: Vec<String>,
        after: Duration,
    },

    #[error("operations dropped without reporting: {pending:?}")]
    Abandoned { pending: Vec<String> },

    #[error("operation {name:?} registered twice")]
    DuplicateName { name: String },
}

type Outcome<T> = Result<BTreeMap<String, T>, Vec<String>>;

struct Barrier<T> {
    outstanding: BTreeSet<String>,
    results: BTreeMap<String, T>,
    sealed: bool,
    failed: bool,
    tx: Option<oneshot::Sender<Outcome<T>>>,
}

impl<T> Barrier<T> {
    fn fire_if_done(&mut self) {
        if !self.sealed || !(self.outstanding.is_empty() || self.failed) {
            return;
        }
        if let Some(tx) = self.tx.take() {
            let results = std::mem::take(&mut self.results);
            // The waiter may have timed out and gone away.
            let _ = tx.send(Ok(results));
        }
    }
}

impl<T> Drop for Barrier<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(self.outstanding.iter().cloned().collect()));
        }
    }
}

fn lock<T>(barrier: &Mutex<Barrier<T>>) -> std::sync::MutexGuard<'_, Barrier<T>> {
    barrier.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reporting half for one named operation.
pub struct Completer<T> {
    name: String,
    barrier: Arc<Mutex<Barrier<T>>>,
}

impl<T> Completer<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report this operation's result.
    ///
    /// Returns `false` (and drops `value`) if this operation already reported.
    pub fn complete(&self, value: T) -> bool {
        self.report(value, false)
    }

    /// Report a failed result. The wait resolves without waiting for the
    /// operations still outstanding; their later reports are discarded.
    ///
    /// Returns `false` (and drops `value`) if this operation already reported.
    pub fn fail(&self, value: T) -> bool {
        self.report(value, true)
    }

    fn report(&self, value: T, failed: bool) -> bool {
        let mut barrier = lock(&self.barrier);
        if !barrier.outstanding.remove(&self.name) {
            warn!(operation = %self.name, "ignoring repeat completion");
            return false;
        }
        debug!(
            operation = %self.name,
            failed,
            remaining = barrier.outstanding.len(),
            "operation completed"
        );
        barrier.results.insert(self.name.clone(), value);
        barrier.failed |= failed;
        barrier.fire_if_done();
        true
    }
}

/// Waiting half of the barrier.
pub struct CompletionWaiter<T> {
    barrier: Weak<Mutex<Barrier<T>>>,
    // Keeps the barrier alive until `wait` seals it; dropped afterwards so
    // that abandonment by every completer can be observed.
    anchor: Option<Arc<Mutex<Barrier<T>>>>,
    rx: oneshot::Receiver<Outcome<T>>,
    timeout: Option<Duration>,
}

impl<T> CompletionWaiter<T> {
    /// Create an empty barrier. `timeout` of `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        let (tx, rx) = oneshot::channel();
        let barrier = Arc::new(Mutex::new(Barrier {
            outstanding: BTreeSet::new(),
            results: BTreeMap::new(),
            sealed: false,
            failed: false,
            tx: Some(tx),
        }));
        Self {
            barrier: Arc::downgrade(&barrier),
            anchor: Some(barrier),
            rx,
            timeout,
        }
    }

    /// Build a barrier over a fixed set of names.
    pub fn with_names<I, S>(
        names: I,
        timeout: Option<Duration>,
    ) -> Result<(Self, Vec<Completer<T>>), WaitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let waiter = Self::new(timeout);
        let completers = names
            .into_iter()
            .map(|name| waiter.register(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((waiter, completers))
    }

    /// Register a named operation and return its completer.
    pub fn register(&self, name: impl Into<String>) -> Result<Completer<T>, WaitError> {
        let name = name.into();
        let barrier = self.anchor.clone().ok_or_else(|| WaitError::Abandoned {
            pending: vec![name.clone()],
        })?;
        {
            let mut guard = lock(&barrier);
            if guard.results.contains_key(&name) || !guard.outstanding.insert(name.clone()) {
                return Err(WaitError::DuplicateName { name });
            }
        }
        Ok(Completer { name, barrier })
    }

    /// Names registered but not yet reported.
    pub fn pending(&self) -> Vec<String> {
        self.barrier
            .upgrade()
            .map(|barrier| lock(&barrier).outstanding.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Seal the set of operations and wait for all of them to report.
    pub async fn wait(mut self) -> Result<BTreeMap<String, T>, WaitError> {
        if let Some(anchor) = self.anchor.take() {
            let mut barrier = lock(&anchor);
            barrier.sealed = true;
            barrier.fire_if_done();
        }

        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    let pending = self.pending();
                    warn!(?pending, after = ?limit, "completion barrier timed out");
                    return Err(WaitError::Timeout {
                        pending,
                        after: limit,
                    });
                }
            },
            None => (&mut self.rx).await,
        };

        match received {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(pending)) => Err(WaitError::Abandoned { pending }),
            Err(_) => Err(WaitError::Abandoned {
                pending: Vec::new(),
            }),
        }
    }

    /// Wait for every operation, then run `on_complete` exactly once over
    /// the results.
    pub async fn wait_then<R>(
        self,
        on_complete: impl FnOnce(BTreeMap<String, T>) -> R,
    ) -> Result<R, WaitError> {
        self.wait().await.map(on_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_after_all_report_in_any_order() {
        let waiter = CompletionWaiter::new(None);
        let a = waiter.register("a").unwrap();
        let b = waiter.register("b").unwrap();

        tokio::spawn(async move {
            tokio::task::yield_now().await;
            a.complete(1)
        });
        tokio::spawn(async move { b.complete(2) });

        let results = waiter.wait().await.unwrap();
        assert_eq!(results.get("a"), Some(&1));
        assert_eq!(results.get("b"), Some(&2));
    }

    #[tokio::test]
    async fn empty_barrier_completes_immediately() {
        let waiter: CompletionWaiter<u8> = CompletionWaiter::new(Some(Duration::from_millis(1)));
        assert!(waiter.wait().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeat_completion_is_ignored() {
        let waiter = CompletionWaiter::new(None);
        let a = waiter.register("a").unwrap();
        assert!(a.complete("first"));
        assert!(!a.complete("second"));
        let results = waiter.wait().await.unwrap();
        assert_eq!(results["a"], "first");
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let waiter: CompletionWaiter<()> = CompletionWaiter::new(None);
        let _a = waiter.register("a").unwrap();
        assert_eq!(
            waiter.register("a").err(),
            Some(WaitError::DuplicateName { name: "a".into() })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_pending_operations() {
        let waiter = CompletionWaiter::new(Some(Duration::from_secs(5)));
        let fast = waiter.register("fast").unwrap();
        let _slow = waiter.register("slow").unwrap();
        fast.complete(());

        let err = waiter.wait().await.unwrap_err();
        assert_eq!(
            err,
            WaitError::Timeout {
                pending: vec!["slow".to_string()],
                after: Duration::from_secs(5),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_resolves_without_waiting_for_the_rest() {
        let waiter = CompletionWaiter::new(Some(Duration::from_secs(30)));
        let broken = waiter.register("broken").unwrap();
        let slow = waiter.register("slow").unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            slow.complete(Ok(()))
        });
        assert!(broken.fail(Err("offline")));
        assert!(!broken.complete(Ok(())));

        let started = tokio::time::Instant::now();
        let results = waiter.wait().await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(results.len(), 1);
        assert_eq!(results["broken"], Err("offline"));
    }

    #[tokio::test]
    async fn failure_before_sealing_still_fires_once_sealed() {
        let waiter = CompletionWaiter::new(None);
        let a = waiter.register("a").unwrap();
        let _b = waiter.register("b").unwrap();
        a.fail(7u8);

        let results = waiter.wait().await.unwrap();
        assert_eq!(results.get("a"), Some(&7));
        assert!(!results.contains_key("b"));
    }

    #[tokio::test]
    async fn dropped_completers_abandon_the_wait() {
        let waiter = CompletionWaiter::new(None);
        let a = waiter.register("a").unwrap();
        let b = waiter.register("b").unwrap();
        a.complete(1u32);
        drop(a);
        drop(b);

        let err = waiter.wait().await.unwrap_err();
        assert_eq!(
            err,
            WaitError::Abandoned {
                pending: vec!["b".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn with_names_hands_out_completers_in_order() {
        let (waiter, completers) =
            CompletionWaiter::with_names(["left", "right"], None).unwrap();
        assert_eq!(waiter.pending(), vec!["left".to_string(), "right".to_string()]);
        let names: Vec<_> = completers.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["left", "right"]);

        for completer in &completers {
            completer.complete(completer.name().len());
        }
        let results = waiter.wait().await.unwrap();
        assert_eq!(results["left"], 4);
        assert_eq!(results["right"], 5);

        assert!(matches!(
            CompletionWaiter::<()>::with_names(["x", "x"], None),
            Err(WaitError::DuplicateName { .. })
        ));
    }

    #[tokio::test]
    async fn wait_then_runs_callback_once() {
        let waiter = CompletionWaiter::new(None);
        let x = waiter.register("x").unwrap();
        let y = waiter.register("y").unwrap();
        x.complete(20);
        y.complete(22);
        let sum = waiter
            .wait_then(|results| results.values().sum::<i32>())
            .await
            .unwrap();
        assert_eq!(sum, 42);
    }
}
