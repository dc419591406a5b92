//! Shared store observed by many readers and mutated by the reconciler.

use feastline_core::notification::NotificationRecord;
use feastline_core::store::StoreState;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

/// Cheaply cloneable handle to the client-side store.
///
/// Readers take snapshots or subscribe to the revision counter, which is
/// bumped after every mutation. Only [`crate::StateReconciler`] mutates.
#[derive(Clone)]
pub struct SharedStore {
    state: Arc<RwLock<StoreState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl SharedStore {
    pub fn new(max_notifications: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(StoreState::with_notification_limit(max_notifications))),
            revision: Arc::new(revision),
        }
    }

    /// Clones the whole state.
    pub fn snapshot(&self) -> StoreState {
        self.read(StoreState::clone)
    }

    /// Runs `f` against the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.read(|state| state.notifications.records().to_vec())
    }

    pub fn unread_count(&self) -> u32 {
        self.read(|state| state.notifications.unread_count())
    }

    /// Receiver of the revision counter; `changed()` fires on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Applies `f` under the write lock. The revision is bumped when `f`
    /// reports a change.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> (bool, R)) -> R {
        let (changed, result) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };
        if changed {
            self.revision.send_modify(|revision| *revision += 1);
        }
        result
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new(feastline_core::store::DEFAULT_MAX_NOTIFICATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use feastline_core::notification::NotificationType;

    #[test]
    fn test_mutation_bumps_revision_only_on_change() {
        let store = SharedStore::default();
        let rx = store.subscribe();

        store.mutate(|state| {
            let record = NotificationRecord::new("n1", NotificationType::General, "hi", Utc::now());
            (state.notifications.insert(record), ())
        });
        assert_eq!(store.revision(), 1);
        assert!(rx.has_changed().unwrap());

        store.mutate(|state| (state.notifications.mark_as_read("missing"), ()));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = SharedStore::default();
        let before = store.snapshot();
        store.mutate(|state| {
            state.wallet.balance = 10.0;
            (true, ())
        });
        assert_eq!(before.wallet.balance, 0.0);
        assert_eq!(store.snapshot().wallet.balance, 10.0);
    }
}
