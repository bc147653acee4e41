//! Port for the resource-fetch primitive.

use async_trait::async_trait;

use crate::domain::entities::{LoaderHandle, Priority};
use crate::domain::errors::ResolveError;

/// Materialises a displayable resource from a locator.
///
/// Implementations must be cancel-safe: the cache aborts a fetch by
/// dropping its future, so no state may outlive the borrowed handle.
#[async_trait]
pub trait ResourceFetcherPort: Send + Sync {
    /// Fetches `locator` using `handle` as scratch space and returns the
    /// location the UI should display.
    async fn fetch(
        &self,
        handle: &mut LoaderHandle,
        locator: &str,
        priority: Priority,
    ) -> Result<String, ResolveError>;
}
