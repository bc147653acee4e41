//! Offline image lookup in the download store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{trace, warn};

use crate::domain::entities::EntityKind;
use crate::domain::ports::LocalImagePort;

const DEFAULT_SERVER_DIR: &str = "default";

/// Filesystem layout of downloaded books and series.
///
/// ```text
/// {root}/{server}/books/{file_id}/files/cover.webp
/// {root}/{server}/series/{series_id}/cover.webp
/// {root}/{server}/series/{series_id}/files/{file_id}.jpg
/// ```
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expected image path for an entity.
    #[must_use]
    pub fn image_path(
        &self,
        kind: EntityKind,
        series_id: i64,
        file_id: Option<i64>,
        server: Option<&str>,
    ) -> PathBuf {
        let base = self.root.join(server_dir_name(server));
        match kind {
            EntityKind::Book => base
                .join("books")
                .join(series_id.to_string())
                .join("files")
                .join("cover.webp"),
            EntityKind::Manga => base
                .join("series")
                .join(series_id.to_string())
                .join("cover.webp"),
            EntityKind::File => base
                .join("series")
                .join(series_id.to_string())
                .join("files")
                .join(format!("{}.jpg", file_id.unwrap_or_default())),
        }
    }
}

/// Directory name for a server URL: `/ : ? &` become `_`.
#[must_use]
pub fn server_dir_name(server: Option<&str>) -> String {
    match server.filter(|s| !s.is_empty()) {
        Some(server) => server.replace(['/', ':', '?', '&'], "_"),
        None => DEFAULT_SERVER_DIR.to_string(),
    }
}

#[async_trait]
impl LocalImagePort for LocalImageStore {
    async fn find_local_image(
        &self,
        kind: EntityKind,
        series_id: i64,
        file_id: Option<i64>,
        server: Option<String>,
    ) -> Option<String> {
        let path = self.image_path(kind, series_id, file_id, server.as_deref());
        match tokio::fs::try_exists(&path).await {
            Ok(true) => {
                trace!(path = %path.display(), "Local image found");
                Some(format!("file://{}", path.display()))
            }
            Ok(false) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to check local image");
                None
            }
        }
    }
}
