//! Local cache of notification state.
//!
//! The cache seeds the notification list and unread counter before the
//! event channel is live, and is rewritten on every mutation of either.

use crate::error::Result;
use crate::notification::NotificationRecord;
use serde::{Deserialize, Serialize};

/// Notification state as persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedNotifications {
    pub notifications: Vec<NotificationRecord>,
    pub unread_count: u32,
}

/// Durable key-value persistence for notification state.
///
/// Implementations report failures; callers degrade to defaults and log.
pub trait NotificationCache: Send + Sync {
    /// Loads the persisted state. A missing key yields the default.
    fn load(&self) -> Result<CachedNotifications>;

    fn save_notifications(&self, notifications: &[NotificationRecord]) -> Result<()>;

    fn save_unread_count(&self, unread_count: u32) -> Result<()>;

    /// Erases both keys.
    fn clear(&self) -> Result<()>;
}
