//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheEntry, CacheKey, EntityKind, LibraryItem, Priority, ResolveOptions};
pub use errors::ResolveError;
pub use ports::{LocalImagePort, ResourceFetcherPort};
