pub mod config_service;
pub mod local_cache;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::local_cache::{FileNotificationCache, MemoryNotificationCache};
pub use crate::paths::FeastlinePaths;
