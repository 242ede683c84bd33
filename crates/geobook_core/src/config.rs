//! Runtime configuration.
//!
//! # Responsibility
//! - Describe storage, media, search and logging settings in one document.
//! - Load and validate that document from JSON.
//!
//! # Invariants
//! - Every section has defaults; an empty JSON object is a valid config.
//! - `load`/`from_json_str` return only validated configs.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "cannot parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeobookConfig {
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl GeobookConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.database_path must not be empty".to_string(),
            ));
        }
        if self.media.thumbnail_max_width == 0 || self.media.thumbnail_max_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "media thumbnail bounds must be positive, got {}x{}",
                self.media.thumbnail_max_width, self.media.thumbnail_max_height
            )));
        }
        if self.media.media_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "media.media_root must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    /// Install the native object extension when opening the database.
    pub native_objects: bool,
    /// Register the SQL spatial functions when opening the database.
    pub spatial_functions: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("geobook.sqlite3"),
            native_objects: true,
            spatial_functions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Uploads land under `<media_root>/images`, thumbnails under
    /// `<media_root>/thumbnails`.
    pub media_root: PathBuf,
    pub thumbnail_max_width: u32,
    pub thumbnail_max_height: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            thumbnail_max_width: 200,
            thumbnail_max_height: 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Report unfiltered fallbacks as errors instead of flagged results.
    pub strict_degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; file logging is off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}
