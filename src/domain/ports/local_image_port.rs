//! Port for images already stored on the device.

use async_trait::async_trait;

use crate::domain::entities::EntityKind;

/// Looks up downloaded images for offline reading.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalImagePort: Send + Sync {
    /// Returns a displayable location for the stored image, or `None` if
    /// nothing was downloaded for this entity.
    async fn find_local_image(
        &self,
        kind: EntityKind,
        series_id: i64,
        file_id: Option<i64>,
        server: Option<String>,
    ) -> Option<String>;
}
