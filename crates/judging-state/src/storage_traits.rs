//! Storage trait definitions for the contest mirror
//!
//! `MirrorStore` is the realtime-database shape the judging core consumes:
//! point reads, key-ordered child listing, write-or-delete, push with a
//! generated key and added-child subscriptions.
//!
//! The trait is async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::path::StorePath;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Callback invoked with `(child_key, child_value)` for each added child.
pub type AddedHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Handle returned by [`MirrorStore::subscribe_added`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Mirrored realtime store.
///
/// Guarantees:
/// - `get` returns `None` for absent nodes; `null` is never stored.
/// - `list` returns children ordered by key, empty when the node is absent.
/// - `set(path, None)` deletes the subtree; deleting an absent node is a no-op.
/// - `set` replaces the whole value at `path` in one write.
/// - `subscribe_added` fires once per existing child, then once per child
///   added afterwards.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Point read.
    async fn get(&self, path: &StorePath) -> StorageResult<Option<Value>>;

    /// Key-ordered enumeration of the children of `path`.
    async fn list(&self, path: &StorePath) -> StorageResult<BTreeMap<String, Value>>;

    /// Write `value` at `path`, or delete it when `value` is `None`.
    async fn set(&self, path: &StorePath, value: Option<Value>) -> StorageResult<()>;

    /// Append `value` under a freshly generated child key and return the key.
    async fn push(&self, path: &StorePath, value: Value) -> StorageResult<String> {
        let key = uuid::Uuid::new_v4().simple().to_string();
        self.set(&path.child(key.clone())?, Some(value)).await?;
        Ok(key)
    }

    /// Register `handler` for children added under `path`.
    async fn subscribe_added(
        &self,
        path: &StorePath,
        handler: AddedHandler,
    ) -> StorageResult<SubscriptionId>;

    /// Drop a subscription. No-op if it is already gone.
    async fn unsubscribe(&self, id: SubscriptionId) -> StorageResult<()>;
}
