//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryMirrorStore`, a JSON tree behind a mutex that satisfies
//! the [`MirrorStore`] contract without any external dependencies, plus
//! read/write failure injection for exercising error paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::StorageError;
use crate::notify::AddedNotifier;
use crate::path::StorePath;
use crate::storage_traits::*;
use crate::tree;

/// In-memory mirror store backed by a single `serde_json::Value` tree.
///
/// Every operation yields to the scheduler once before touching the tree so
/// concurrent callers interleave the way they would against a remote store.
pub struct MemoryMirrorStore {
    tree: Mutex<Value>,
    notifier: AddedNotifier,
    failing_reads: Mutex<Vec<StorePath>>,
    failing_writes: Mutex<Vec<StorePath>>,
    writes: AtomicU64,
}

impl Default for MemoryMirrorStore {
    fn default() -> Self {
        Self {
            tree: Mutex::new(json!({})),
            notifier: AddedNotifier::new(),
            failing_reads: Mutex::new(Vec::new()),
            failing_writes: Mutex::new(Vec::new()),
            writes: AtomicU64::new(0),
        }
    }
}

impl MemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose tree starts as `root` (must be an object).
    pub fn with_tree(root: Value) -> Self {
        let store = Self::default();
        if root.is_object() {
            *store.tree.lock().unwrap_or_else(PoisonError::into_inner) = root;
        }
        store
    }

    /// Copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Make every read at or beneath `path` fail with `StorageError::Injected`.
    pub fn fail_reads_under(&self, path: StorePath) {
        self.failing_reads.lock().unwrap_or_else(PoisonError::into_inner).push(path);
    }

    /// Make every write at or beneath `path` fail with `StorageError::Injected`.
    pub fn fail_writes_under(&self, path: StorePath) {
        self.failing_writes.lock().unwrap_or_else(PoisonError::into_inner).push(path);
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(rules: &Mutex<Vec<StorePath>>, path: &StorePath) -> StorageResult<()> {
        let rules = rules.lock().unwrap_or_else(PoisonError::into_inner);
        if rules.iter().any(|rule| path.starts_with(rule)) {
            return Err(StorageError::Injected {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MirrorStore for MemoryMirrorStore {
    async fn get(&self, path: &StorePath) -> StorageResult<Option<Value>> {
        tokio::task::yield_now().await;
        Self::check(&self.failing_reads, path)?;
        let tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(tree::lookup(&tree, path.segments()).cloned())
    }

    async fn list(&self, path: &StorePath) -> StorageResult<BTreeMap<String, Value>> {
        tokio::task::yield_now().await;
        Self::check(&self.failing_reads, path)?;
        let tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        tree::children(tree::lookup(&tree, path.segments()), path)
    }

    async fn set(&self, path: &StorePath, value: Option<Value>) -> StorageResult<()> {
        tokio::task::yield_now().await;
        Self::check(&self.failing_writes, path)?;

        let added: Vec<(StorePath, Value)> = {
            let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
            let first_new = (1..=path.len()).find(|len| {
                tree::lookup(&tree, &path.segments()[..*len]).is_none()
            });
            tree::write(&mut tree, path.segments(), value);
            match first_new {
                Some(start) => (start..=path.len())
                    .filter_map(|len| {
                        let prefix = path.prefix(len)?;
                        let value = tree::lookup(&tree, prefix.segments())?.clone();
                        Some((prefix, value))
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        self.writes.fetch_add(1, Ordering::SeqCst);

        for (child, value) in &added {
            self.notifier.notify_added(child, value);
        }
        Ok(())
    }

    async fn subscribe_added(
        &self,
        path: &StorePath,
        handler: AddedHandler,
    ) -> StorageResult<SubscriptionId> {
        Self::check(&self.failing_reads, path)?;
        let (id, existing) = {
            let tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
            let existing = tree::children(tree::lookup(&tree, path.segments()), path)?;
            let id = self.notifier.register(path.clone(), handler.clone());
            (id, existing)
        };
        for (key, value) in &existing {
            handler(key, value);
        }
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> StorageResult<()> {
        self.notifier.remove(id);
        Ok(())
    }
}
