//! Configuration service.
//!
//! Loads `AppConfig` from `config.toml`, then applies the
//! `FEASTLINE_SOCKET_URL` environment override for the channel endpoint.

use crate::paths::FeastlinePaths;
use crate::storage::AtomicFile;
use feastline_core::FeastlineError;
use feastline_core::config::{AppConfig, BASE_URL_ENV};
use feastline_core::error::Result;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// Uses the default `config.toml` location.
    pub fn new(paths: &FeastlinePaths) -> Self {
        let path = match paths.config_file() {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("[Config] {}; using built-in defaults", e);
                None
            }
        };
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Uses an explicit config file.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the effective configuration, loading it on first access.
    ///
    /// A missing or unreadable file yields defaults; the environment
    /// override is applied either way.
    pub fn get_config(&self) -> AppConfig {
        {
            let read_lock = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = match self.load_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[Config] Failed to load config file, using defaults: {}", e);
                AppConfig::default()
            }
        };
        let effective = apply_env_override(loaded, std::env::var(BASE_URL_ENV).ok());

        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = Some(effective.clone());
        effective
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = None;
    }

    /// Writes `config` to the config file.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| FeastlineError::config("no config file location"))?;
        AtomicFile::toml(path).save(config)?;
        self.invalidate_cache();
        Ok(())
    }

    fn load_file(&self) -> Result<AppConfig> {
        let Some(path) = &self.path else {
            return Ok(AppConfig::default());
        };
        let config = AtomicFile::<AppConfig>::toml(path.clone())
            .load()?
            .unwrap_or_default();
        tracing::debug!("[Config] Loaded {:?}", path);
        Ok(config)
    }
}

/// Applies the endpoint override; blank values are ignored.
pub fn apply_env_override(mut config: AppConfig, base_url: Option<String>) -> AppConfig {
    if let Some(url) = base_url.map(|u| u.trim().to_string())
        && !url.is_empty()
    {
        config.channel.base_url = url;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use feastline_core::config::DEFAULT_BASE_URL;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));
        let config = service.load_file().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[channel\nbase_url = ").unwrap();
        let service = ConfigService::with_path(path);
        assert!(service.load_file().is_err());
        assert_eq!(
            service.get_config().channel.reconnect,
            AppConfig::default().channel.reconnect
        );
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));
        let mut config = AppConfig::default();
        config.channel.base_url = "https://food.example.com".to_string();
        config.notifications.sound_enabled = false;
        service.save(&config).unwrap();

        let loaded = service.load_file().unwrap();
        assert_eq!(loaded.channel.base_url, "https://food.example.com");
        assert!(!loaded.notifications.sound_enabled);
    }

    #[test]
    fn test_save_refreshes_cached_config() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("config.toml"));
        let before = service.load_file().unwrap();
        let _ = service.get_config();

        let mut config = before.clone();
        config.notifications.toast_duration_ms = 9000;
        service.save(&config).unwrap();

        assert_eq!(service.get_config().notifications.toast_duration_ms, 9000);
    }

    #[test]
    fn test_env_override() {
        let config = apply_env_override(AppConfig::default(), Some("https://rt.example.com".into()));
        assert_eq!(config.channel.base_url, "https://rt.example.com");

        let config = apply_env_override(AppConfig::default(), Some("   ".into()));
        assert_eq!(config.channel.base_url, DEFAULT_BASE_URL);

        let config = apply_env_override(AppConfig::default(), None);
        assert_eq!(config.channel.base_url, DEFAULT_BASE_URL);
    }
}
