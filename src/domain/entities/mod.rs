//! Domain entity definitions.

mod cache_entry;
mod cache_key;
mod image_request;
mod library_item;
mod loader_handle;

pub use cache_entry::CacheEntry;
pub use cache_key::{CacheKey, EntityKind, LOCAL_SCOPE, generate_key};
pub use image_request::{
    DEFAULT_HIGH_PRIORITY_TIMEOUT, DEFAULT_LOW_PRIORITY_TIMEOUT, Priority, ResolveOptions,
};
pub use library_item::LibraryItem;
pub use loader_handle::{LoaderHandle, MAX_RETAINED_BUFFER};
