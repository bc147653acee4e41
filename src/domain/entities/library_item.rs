//! Library entities that own a displayable image.

use serde::{Deserialize, Serialize};

use super::cache_key::EntityKind;

/// A book, series or file as seen by the image layer.
///
/// Only the identifiers needed to locate an image are kept; the rest of the
/// library record lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LibraryItem {
    /// A book.
    Book {
        /// Server-side id.
        id: i64,
        /// Id of the downloaded file, used for offline lookups.
        file_id: i64,
    },
    /// A manga series.
    Series {
        /// Server-side id.
        id: i64,
        /// Id of the locally stored series.
        series_id: i64,
        /// Server the series was downloaded from.
        #[serde(default)]
        server: Option<String>,
    },
    /// A file (volume / chapter) of a series.
    File {
        /// Server-side id.
        id: i64,
        /// Id of the downloaded file.
        file_id: i64,
        /// Parent series id.
        series_id: i64,
        /// Server the file was downloaded from.
        #[serde(default)]
        server: Option<String>,
    },
}

impl LibraryItem {
    /// Server-side id.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Book { id, .. } | Self::Series { id, .. } | Self::File { id, .. } => *id,
        }
    }

    /// Kind used for cache keys.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Book { .. } => EntityKind::Book,
            Self::Series { .. } => EntityKind::Manga,
            Self::File { .. } => EntityKind::File,
        }
    }

    /// Id that identifies the image slot in the given mode.
    ///
    /// Offline, books are addressed by their downloaded file and series or
    /// files by their local series.
    #[must_use]
    pub const fn cache_identity(&self, offline: bool) -> i64 {
        if !offline {
            return self.id();
        }
        match self {
            Self::Book { file_id, .. } => *file_id,
            Self::Series { series_id, .. } | Self::File { series_id, .. } => *series_id,
        }
    }

    /// File id for offline file previews.
    #[must_use]
    pub const fn local_file_id(&self) -> Option<i64> {
        match self {
            Self::File { file_id, .. } => Some(*file_id),
            Self::Book { .. } | Self::Series { .. } => None,
        }
    }

    /// Origin server recorded for offline content.
    #[must_use]
    pub fn origin_server(&self) -> Option<&str> {
        match self {
            Self::Series { server, .. } | Self::File { server, .. } => server.as_deref(),
            Self::Book { .. } => None,
        }
    }
}
