//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image caching, fetching and offline lookup.
pub mod image;

pub use config::{AppConfig, CacheConfig, CliArgs, LogLevel, PreloadConfig, StorageManager};
pub use image::{
    BatchOptions, CacheStats, HandlePool, HttpImageFetcher, LocalImageStore, ResourceCache,
};
