//! On-disk persistence of `config.toml`.

use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::app_config::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER, AppConfig};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform config directory could be determined.
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    /// The file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file or its directory could not be written.
    #[error("cannot write {path}: {source}")]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The configuration could not be encoded.
    #[error("cannot encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Locates, loads and saves the configuration file.
#[derive(Debug, Clone)]
pub struct StorageManager {
    config_dir: PathBuf,
}

impl StorageManager {
    /// Uses the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoConfigDir` if the platform has none.
    pub fn new() -> Result<Self, ConfigError> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| Self::with_dir(dirs.config_dir()))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Uses `dir` as the config directory.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
        }
    }

    /// Directory holding `config.toml`.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// File used for `override_path`, or the default file.
    #[must_use]
    pub fn config_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path.map_or_else(|| self.config_dir.join(CONFIG_FILE_NAME), Path::to_path_buf)
    }

    /// Loads the configuration.
    ///
    /// A missing file is written with defaults. A file that does not parse
    /// is left alone and defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, or the default
    /// file cannot be written.
    pub fn load_config(&self, override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let path = self.config_path(override_path);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file, writing defaults");
                let config = AppConfig::default();
                Self::write_atomic(&path, &toml::to_string_pretty(&config)?)?;
                return Ok(config);
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config = toml::from_str::<AppConfig>(&content).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "Invalid config file, using defaults");
            AppConfig::default()
        });
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Saves `config` to its override path, or the default file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be encoded or written.
    pub fn save_config(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let path = self.config_path(config.config.as_deref());
        Self::write_atomic(&path, &toml::to_string_pretty(config)?)
    }

    /// Replaces `path` with `contents` through a temp file in the same
    /// directory.
    fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        staged.write_all(contents.as_bytes()).map_err(write_err)?;
        staged.persist(path).map_err(|err| write_err(err.error))?;
        Ok(())
    }
}
