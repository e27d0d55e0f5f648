//! Runtime configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve database path, blob directory and logging settings.
//! - Fall back to paths under the system temp directory when unset.
//!
//! # Invariants
//! - Blank environment values count as unset.
//! - `log_level` is always one of `trace|debug|info|warn|error`.

use crate::db::DbError;
use crate::logging::{default_log_level, init_logging, normalize_level};
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DB_PATH_ENV: &str = "RESVAULT_DB_PATH";
pub const BLOB_DIR_ENV: &str = "RESVAULT_BLOB_DIR";
pub const LOG_LEVEL_ENV: &str = "RESVAULT_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "RESVAULT_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "resvault.sqlite3";
const DEFAULT_BLOB_DIR_NAME: &str = "resvault_blobs";

/// Configuration and vault bootstrap errors.
#[derive(Debug)]
pub enum ConfigError {
    InvalidLogLevel(String),
    EmptyPath(&'static str),
    Db(DbError),
    Store(StoreError),
    Logging(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::EmptyPath(field) => write!(f, "{field} cannot be empty"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging init failed: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for ConfigError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Where the vault keeps its catalog, blobs and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    pub db_path: PathBuf,
    pub blob_dir: PathBuf,
    pub log_level: &'static str,
    /// File logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let temp = std::env::temp_dir();
        Self {
            db_path: temp.join(DEFAULT_DB_FILE_NAME),
            blob_dir: temp.join(DEFAULT_BLOB_DIR_NAME),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl VaultConfig {
    /// Reads `RESVAULT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, one call per variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dir) = read(BLOB_DIR_ENV) {
            config.blob_dir = PathBuf::from(dir);
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = normalize_level(&level).map_err(ConfigError::InvalidLogLevel)?;
        }
        config.log_dir = read(LOG_DIR_ENV).map(PathBuf::from);
        Ok(config)
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_dir = dir.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Result<Self, ConfigError> {
        self.log_level = normalize_level(level).map_err(ConfigError::InvalidLogLevel)?;
        Ok(self)
    }

    /// Rejects empty paths before anything touches the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_blank(&self.db_path) {
            return Err(ConfigError::EmptyPath("db_path"));
        }
        if is_blank(&self.blob_dir) {
            return Err(ConfigError::EmptyPath("blob_dir"));
        }
        Ok(())
    }

    /// Starts file logging when `log_dir` is set.
    ///
    /// Returns `Ok(false)` without touching the logger otherwise.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(log_dir) = &self.log_dir else {
            return Ok(false);
        };
        init_logging(self.log_level, &log_dir.to_string_lossy()).map_err(ConfigError::Logging)?;
        Ok(true)
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
