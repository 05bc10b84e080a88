//! Per-entry mutual exclusion for vote read-modify-write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::domain::{ContestId, EntryId};

type EntryKey = (ContestId, EntryId);
type Slot = Arc<tokio::sync::Mutex<()>>;

/// One async lock per `(contest, entry)`, created on demand and dropped
/// once nobody holds or waits for it.
#[derive(Default)]
pub(crate) struct EntryLocks {
    slots: Mutex<HashMap<EntryKey, Slot>>,
}

impl EntryLocks {
    fn slots(&self) -> MutexGuard<'_, HashMap<EntryKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to one entry. Released when the guard drops.
    pub(crate) async fn acquire(&self, contest: &ContestId, entry: &EntryId) -> EntryGuard<'_> {
        let key = (contest.clone(), entry.clone());
        let slot = Arc::clone(self.slots().entry(key.clone()).or_default());
        let guard = slot.lock_owned().await;
        EntryGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Entries with a live lock.
    pub(crate) fn len(&self) -> usize {
        self.slots().len()
    }
}

pub(crate) struct EntryGuard<'a> {
    locks: &'a EntryLocks,
    key: EntryKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.locks.slots();
        // Only the map's own reference left: no holder, no waiter.
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}
