//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::entities::{Priority, ResolveOptions};

pub(super) const APP_NAME: &str = "shelfcache";
pub(super) const APP_QUALIFIER: &str = "com";
pub(super) const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Library server base URL.
    #[serde(default)]
    pub server: Option<String>,

    /// Library the client is bound to.
    #[serde(default)]
    pub library_id: Option<u64>,

    /// Read only downloaded content.
    #[serde(default)]
    pub offline: bool,

    /// Root of the offline download store.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Image cache tuning.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Preload tuning.
    #[serde(default)]
    pub preload: PreloadConfig,
}

/// Image cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum resolved entries kept.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum idle loader handles kept for reuse.
    #[serde(default = "default_pool_max")]
    pub pool_max: usize,

    /// Timeout for visible images, in milliseconds.
    #[serde(default = "default_high_priority_timeout_ms")]
    pub high_priority_timeout_ms: u64,

    /// Timeout for preloads, in milliseconds.
    #[serde(default = "default_low_priority_timeout_ms")]
    pub low_priority_timeout_ms: u64,

    /// Interval between age sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Idle time after which a sweep drops an entry, in seconds.
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,
}

impl CacheConfig {
    /// Sweep interval as a duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Maximum idle age as a duration.
    #[must_use]
    pub const fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }

    /// Resolve options for the given priority.
    #[must_use]
    pub const fn resolve_options(&self, priority: Priority) -> ResolveOptions {
        match priority {
            Priority::High => ResolveOptions::high()
                .with_timeout(Duration::from_millis(self.high_priority_timeout_ms)),
            Priority::Low => ResolveOptions::low()
                .with_timeout(Duration::from_millis(self.low_priority_timeout_ms)),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            pool_max: default_pool_max(),
            high_priority_timeout_ms: default_high_priority_timeout_ms(),
            low_priority_timeout_ms: default_low_priority_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_idle_secs: default_max_idle_secs(),
        }
    }
}

/// Preload configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Items warmed on each side of the visible range.
    #[serde(default = "default_overscan")]
    pub overscan: usize,

    /// Delay before the overscan band starts, in milliseconds.
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,

    /// Resolves issued together by batch preloads.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches, in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Delay before a whole library is warmed, in milliseconds.
    #[serde(default = "default_library_start_delay_ms")]
    pub library_start_delay_ms: u64,
}

impl PreloadConfig {
    /// Idle delay as a duration.
    #[must_use]
    pub const fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    /// Batch delay as a duration.
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Library start delay as a duration.
    #[must_use]
    pub const fn library_start_delay(&self) -> Duration {
        Duration::from_millis(self.library_start_delay_ms)
    }
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            overscan: default_overscan(),
            idle_delay_ms: default_idle_delay_ms(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            library_start_delay_ms: default_library_start_delay_ms(),
        }
    }
}

const fn default_capacity() -> usize {
    500
}

const fn default_pool_max() -> usize {
    50
}

const fn default_high_priority_timeout_ms() -> u64 {
    10_000
}

const fn default_low_priority_timeout_ms() -> u64 {
    5_000
}

const fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

const fn default_max_idle_secs() -> u64 {
    30 * 60
}

const fn default_overscan() -> usize {
    20
}

const fn default_idle_delay_ms() -> u64 {
    500
}

const fn default_batch_size() -> usize {
    8
}

const fn default_batch_delay_ms() -> u64 {
    200
}

const fn default_library_start_delay_ms() -> u64 {
    2_000
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(server) = &args.server {
            self.server = Some(server.clone());
        }
        if let Some(library_id) = args.library {
            self.library_id = Some(library_id);
        }
        if args.offline {
            self.offline = true;
        }
        if let Some(data_dir) = &args.data_dir {
            self.data_dir = Some(data_dir.clone());
        }
        if let Some(capacity) = args.capacity {
            self.cache.capacity = capacity;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("shelfcache.log"))
    }

    /// Returns the default offline store root.
    #[must_use]
    pub fn default_data_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_local_dir().to_path_buf())
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }

    /// Returns effective offline store root.
    #[must_use]
    pub fn effective_data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(Self::default_data_dir)
    }
}
