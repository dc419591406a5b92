//! Unified path management for feastline files.
//!
//! ```text
//! ~/.config/feastline/            # Config directory
//! ├── config.toml                 # Application configuration
//! └── logs/                       # CLI logs
//!     └── feastline.log.YYYY-MM-DD
//!
//! ~/.local/share/feastline/       # Data directory
//! └── profiles/<profile>/         # One browser-profile equivalent
//!     ├── notifications.json
//!     └── unread_count.json
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "feastline";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
    /// Profile names become directory names and must stay inside `profiles/`.
    InvalidProfile(String),
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
            PathError::InvalidProfile(name) => write!(f, "Invalid profile name: '{}'", name),
        }
    }
}

impl std::error::Error for PathError {}

/// Path resolver for feastline.
///
/// With a `base` override every directory lives under that root, which is
/// what tests use.
#[derive(Debug, Clone, Default)]
pub struct FeastlinePaths {
    base: Option<PathBuf>,
}

impl FeastlinePaths {
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base }
    }

    /// Returns the feastline configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/feastline/`)
    /// - `Err(PathError::HomeDirNotFound)`: Could not determine directory
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.join("config")),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Returns the feastline data directory.
    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.join("data")),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    /// Returns the path to the main configuration file.
    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("logs"))
    }

    /// Returns the cache directory namespaced for one profile.
    ///
    /// # Arguments
    ///
    /// * `profile` - Profile name; letters, digits, `-`, `_` and `.` only
    pub fn profile_dir(&self, profile: &str) -> Result<PathBuf, PathError> {
        let valid = !profile.is_empty()
            && profile != "."
            && profile != ".."
            && profile
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(PathError::InvalidProfile(profile.to_string()));
        }
        Ok(self.data_dir()?.join("profiles").join(profile))
    }
}
