//! In-process fan-out of added-child notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tracing::trace;

use crate::path::StorePath;
use crate::storage_traits::{AddedHandler, SubscriptionId};

struct Subscription {
    id: SubscriptionId,
    path: StorePath,
    handler: AddedHandler,
}

/// Registry of `subscribe_added` handlers for one store handle.
///
/// Handlers are invoked outside the registry lock, so a handler may itself
/// subscribe or unsubscribe.
#[derive(Default)]
pub struct AddedNotifier {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl AddedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: StorePath, handler: AddedHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription { id, path, handler });
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Notify subscribers of `child.parent()` that `child` was added.
    pub fn notify_added(&self, child: &StorePath, value: &Value) {
        let Some(parent) = child.parent() else {
            return;
        };
        let handlers: Vec<AddedHandler> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.path == parent)
            .map(|s| s.handler.clone())
            .collect();

        for handler in handlers {
            trace!(path = %child, "child added");
            handler(child.key(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn notifies_only_matching_parent() {
        let notifier = AddedNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        notifier.register(
            StorePath::parse("contests").unwrap(),
            Arc::new(move |key, _| sink.lock().unwrap().push(key.to_string())),
        );

        notifier.notify_added(&StorePath::parse("contests/c1").unwrap(), &Value::Bool(true));
        notifier.notify_added(&StorePath::parse("rubrics/Level").unwrap(), &Value::Bool(true));

        assert_eq!(*seen.lock().unwrap(), vec!["c1".to_string()]);
    }

    #[test]
    fn removed_subscription_is_silent() {
        let notifier = AddedNotifier::new();
        let id = notifier.register(StorePath::parse("a").unwrap(), Arc::new(|_, _| panic!()));
        assert!(notifier.remove(id));
        assert!(!notifier.remove(id));
        assert!(notifier.is_empty());
        notifier.notify_added(&StorePath::parse("a/b").unwrap(), &Value::Null);
    }
}
