use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Default, Parser)]
#[command(
    name = "shelfcache",
    version,
    about = "Cover image cache and preloader for a reader library",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Library server base URL.
    #[arg(long, env = "SHELFCACHE_SERVER", value_name = "URL")]
    pub server: Option<String>,

    /// Library id.
    #[arg(long, value_name = "ID")]
    pub library: Option<u64>,

    /// Resolve only downloaded images.
    #[arg(long)]
    pub offline: bool,

    /// Offline store root.
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Maximum cached entries.
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Warm cover images for the given item ids.
    Warm {
        /// Item ids in display order.
        #[arg(required = true)]
        ids: Vec<i64>,

        /// Treat ids as manga series instead of books.
        #[arg(long)]
        manga: bool,

        /// Number of items considered visible.
        #[arg(long, default_value_t = 12)]
        visible: usize,

        /// Print cache statistics as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config {
        /// Print as JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
}
