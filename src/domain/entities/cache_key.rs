//! Cache key derivation for image slots.

use serde::{Deserialize, Serialize};

/// Scope label used when no library is bound (offline / local content).
pub const LOCAL_SCOPE: &str = "local";

/// Kind of entity an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A book (cover image).
    #[default]
    Book,
    /// A manga series (cover image).
    Manga,
    /// A single file inside a series (preview image).
    File,
}

impl EntityKind {
    /// Returns the lowercase label used in keys and paths.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Manga => "manga",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of one logical image slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already formatted key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Builds the key for an entity in the given scope.
    ///
    /// Components are joined with `-`; ids are numeric so the delimiter
    /// never appears inside a component. A scope of `0` counts as unbound.
    #[must_use]
    pub fn generate(entity_id: i64, kind: EntityKind, scope_id: Option<u64>) -> Self {
        match scope_id.filter(|scope| *scope != 0) {
            Some(scope) => Self(format!("{kind}-{entity_id}-{scope}")),
            None => Self(format!("{kind}-{entity_id}-{LOCAL_SCOPE}")),
        }
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Free-function form of [`CacheKey::generate`].
#[must_use]
pub fn generate_key(entity_id: i64, kind: EntityKind, scope_id: Option<u64>) -> CacheKey {
    CacheKey::generate(entity_id, kind, scope_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(42, EntityKind::Book, Some(7), "book-42-7" ; "book_with_library")]
    #[test_case(42, EntityKind::Manga, None, "manga-42-local" ; "manga_local")]
    #[test_case(111, EntityKind::File, Some(222), "file-111-222" ; "file_with_library")]
    #[test_case(5, EntityKind::Book, Some(0), "book-5-local" ; "zero_scope_is_local")]
    fn test_generate_key(id: i64, kind: EntityKind, scope: Option<u64>, expected: &str) {
        assert_eq!(generate_key(id, kind, scope).as_str(), expected);
    }

    #[test]
    fn test_key_is_deterministic() {
        let first = generate_key(9, EntityKind::Manga, Some(3));
        let second = generate_key(9, EntityKind::Manga, Some(3));
        assert_eq!(first, second);
    }

    #[test]
    fn test_scope_and_kind_disambiguate() {
        let base = generate_key(9, EntityKind::Book, Some(3));
        assert_ne!(base, generate_key(9, EntityKind::Book, Some(4)));
        assert_ne!(base, generate_key(9, EntityKind::Book, None));
        assert_ne!(base, generate_key(9, EntityKind::Manga, Some(3)));
        assert_ne!(base, generate_key(9, EntityKind::File, Some(3)));
    }
}
