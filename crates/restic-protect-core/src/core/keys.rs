// crates/restic-protect-core/src/core/keys.rs
// ============================================================================
// Module: Storage Keys
// Description: Bucket-relative object keys and listing entries.
// Purpose: Centralize key joining and listing-marker exclusion rules.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Storage keys are bucket-relative paths. Keys are joined from a repository
//! prefix and fixed layout segments; an empty prefix never introduces an
//! empty path segment, and leading separators are always stripped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Storage Key
// ============================================================================

/// Bucket-relative object key.
///
/// # Invariants
/// - Never starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Creates a key, stripping any leading separators.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim_start_matches('/').to_string())
    }

    /// Joins a repository prefix with layout segments.
    ///
    /// Empty segments (including an empty prefix) are skipped so the result
    /// never contains a doubled separator.
    #[must_use]
    pub fn join(prefix: &str, segments: &[&str]) -> Self {
        let mut key = String::new();
        for part in std::iter::once(prefix).chain(segments.iter().copied()) {
            let part = part.trim_matches('/');
            if part.is_empty() {
                continue;
            }
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(part);
        }
        Self(key)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// SECTION: Object Entry
// ============================================================================

/// A single object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key as returned by the store.
    pub key: String,
    /// Object size in bytes when reported.
    pub size: Option<u64>,
    /// Last modification time when reported.
    pub last_modified: Option<OffsetDateTime>,
}

impl ObjectEntry {
    /// Creates an entry with only a key.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            last_modified: None,
        }
    }
}

/// Returns the entry name relative to `prefix`, or `None` for directory markers.
///
/// Stores sometimes emit an entry for the prefix itself; such entries, and
/// any entry whose key is empty after stripping the prefix, are excluded.
#[must_use]
pub fn listing_entry_name<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    if key.is_empty() || key == prefix {
        return None;
    }
    let name = key.strip_prefix(prefix).unwrap_or(key);
    if name.is_empty() { None } else { Some(name) }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
