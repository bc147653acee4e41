//! Library server image URLs.

use crate::domain::entities::LibraryItem;

/// Library ids reserved for on-device libraries.
pub const LOCAL_LIBRARY_IDS: [u64; 2] = [9998, 9999];

/// Builds the cover URL for a book or series.
///
/// Trailing slashes on `server` are ignored.
#[must_use]
pub fn cover_url(server: &str, library_id: u64, item_id: i64) -> String {
    format!(
        "{}/cover-image/{library_id}/{item_id}.webp",
        server.trim_end_matches('/')
    )
}

/// Builds the preview URL for a file of a series.
#[must_use]
pub fn preview_url(server: &str, library_id: u64, series_id: i64, file_id: i64) -> String {
    format!(
        "{}/preview-image/{library_id}/{series_id}/{file_id}.jpg",
        server.trim_end_matches('/')
    )
}

/// Returns the network locator for an item, or `None` if the context is
/// incomplete (no server or no library).
#[must_use]
pub fn item_image_url(server: &str, library_id: u64, item: &LibraryItem) -> Option<String> {
    if server.is_empty() || library_id == 0 {
        return None;
    }
    Some(match item {
        LibraryItem::File { id, series_id, .. } => {
            preview_url(server, library_id, *series_id, *id)
        }
        LibraryItem::Book { id, .. } | LibraryItem::Series { id, .. } => {
            cover_url(server, library_id, *id)
        }
    })
}

/// Checks if a library id refers to an on-device library.
#[must_use]
pub fn is_local_library(library_id: u64) -> bool {
    LOCAL_LIBRARY_IDS.contains(&library_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_url() {
        assert_eq!(
            cover_url("https://books.example.org/", 2, 15),
            "https://books.example.org/cover-image/2/15.webp"
        );
    }

    #[test]
    fn test_preview_url() {
        assert_eq!(
            preview_url("http://srv", 2, 4, 99),
            "http://srv/preview-image/2/4/99.jpg"
        );
    }

    #[test]
    fn test_item_image_url() {
        let file = LibraryItem::File {
            id: 99,
            file_id: 1,
            series_id: 4,
            server: None,
        };
        let series = LibraryItem::Series {
            id: 4,
            series_id: 40,
            server: None,
        };

        assert_eq!(
            item_image_url("http://srv", 2, &file).as_deref(),
            Some("http://srv/preview-image/2/4/99.jpg")
        );
        assert_eq!(
            item_image_url("http://srv", 2, &series).as_deref(),
            Some("http://srv/cover-image/2/4.webp")
        );
        assert_eq!(item_image_url("", 2, &series), None);
        assert_eq!(item_image_url("http://srv", 0, &series), None);
    }

    #[test]
    fn test_is_local_library() {
        assert!(is_local_library(9999));
        assert!(is_local_library(9998));
        assert!(!is_local_library(1));
    }
}
