//! Notification cache implementations.
//!
//! [`FileNotificationCache`] keeps the two keys as separate JSON documents
//! under a profile directory. [`MemoryNotificationCache`] backs tests and
//! ephemeral sessions.

use crate::paths::FeastlinePaths;
use crate::storage::AtomicFile;
use feastline_core::FeastlineError;
use feastline_core::cache::{CachedNotifications, NotificationCache};
use feastline_core::error::Result;
use feastline_core::notification::NotificationRecord;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const NOTIFICATIONS_KEY: &str = "notifications.json";
const UNREAD_KEY: &str = "unread_count.json";

/// File-backed cache, one directory per profile.
pub struct FileNotificationCache {
    notifications: AtomicFile<Vec<NotificationRecord>>,
    unread: AtomicFile<u32>,
}

impl FileNotificationCache {
    /// Creates a cache rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            notifications: AtomicFile::json(dir.join(NOTIFICATIONS_KEY)),
            unread: AtomicFile::json(dir.join(UNREAD_KEY)),
        }
    }

    /// Creates the cache for a named profile under the data directory.
    pub fn for_profile(paths: &FeastlinePaths, profile: &str) -> Result<Self> {
        let dir = paths
            .profile_dir(profile)
            .map_err(|e| FeastlineError::config(e.to_string()))?;
        Ok(Self::new(dir))
    }

    pub fn notifications_path(&self) -> PathBuf {
        self.notifications.path().to_path_buf()
    }
}

impl NotificationCache for FileNotificationCache {
    /// Each key falls back to its default on its own; a corrupt counter
    /// never discards a readable list.
    fn load(&self) -> Result<CachedNotifications> {
        let notifications = load_key(&self.notifications);
        let unread_count = load_key(&self.unread);
        tracing::debug!(
            "[Cache] Loaded {} notification(s), {} unread",
            notifications.len(),
            unread_count
        );
        Ok(CachedNotifications {
            notifications,
            unread_count,
        })
    }

    fn save_notifications(&self, notifications: &[NotificationRecord]) -> Result<()> {
        self.notifications.save(&notifications.to_vec())?;
        Ok(())
    }

    fn save_unread_count(&self, unread_count: u32) -> Result<()> {
        self.unread.save(&unread_count)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.notifications.remove()?;
        self.unread.remove()?;
        tracing::debug!("[Cache] Cleared notification keys");
        Ok(())
    }
}

fn load_key<T>(file: &AtomicFile<T>) -> T
where
    T: Default + serde::Serialize + serde::de::DeserializeOwned,
{
    match file.load() {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(
                "[Cache] Ignoring unreadable {}: {}",
                file.path().display(),
                err
            );
            T::default()
        }
    }
}

/// In-process cache. Writes can be made to fail to exercise degradation.
#[derive(Default)]
pub struct MemoryNotificationCache {
    state: Mutex<CachedNotifications>,
    fail_writes: Mutex<bool>,
}

impl MemoryNotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: CachedNotifications) -> Self {
        Self {
            state: Mutex::new(state),
            fail_writes: Mutex::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    pub fn snapshot(&self) -> CachedNotifications {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_writable(&self) -> Result<()> {
        if *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(FeastlineError::io("cache is read-only"));
        }
        Ok(())
    }
}

impl NotificationCache for MemoryNotificationCache {
    fn load(&self) -> Result<CachedNotifications> {
        Ok(self.snapshot())
    }

    fn save_notifications(&self, notifications: &[NotificationRecord]) -> Result<()> {
        self.check_writable()?;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .notifications = notifications.to_vec();
        Ok(())
    }

    fn save_unread_count(&self, unread_count: u32) -> Result<()> {
        self.check_writable()?;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unread_count = unread_count;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_writable()?;
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = CachedNotifications::default();
        Ok(())
    }
}
