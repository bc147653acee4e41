//! Image handling infrastructure.
//!
//! This module provides:
//! - The single-flight resource cache with eviction and age sweeps
//! - A bounded pool of reusable loader handles
//! - HTTP / filesystem fetching and offline store lookup
//! - Library server URL composition

pub mod handle_pool;
pub mod http_fetcher;
pub mod image_urls;
pub mod local_store;
pub mod resource_cache;

pub use handle_pool::HandlePool;
pub use http_fetcher::HttpImageFetcher;
pub use image_urls::{cover_url, is_local_library, item_image_url, preview_url};
pub use local_store::LocalImageStore;
pub use resource_cache::{BatchOptions, CacheStats, ResourceCache};
