// crates/restic-protect-core/src/core/manifest.rs
// ============================================================================
// Module: Snapshot Manifest
// Description: Snapshot identifier plus referenced pack identifiers.
// Purpose: Parse the engine's dry-run restore output into a typed manifest.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The backup engine declares which snapshot "latest" resolves to and which
//! data packs a restore of it would read. This module parses that declaration
//! without interpreting any backup internals.
//!
//! ## Invariants
//! - `snapshot_id` is non-empty and contains no path separators.
//! - `pack_ids` preserves engine order, duplicates included.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Manifest parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// Output is not a well-formed manifest.
    #[error("manifest parse error: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// Dependencies of the latest snapshot as declared by the backup engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Snapshot identifier.
    #[serde(rename = "snapshot")]
    pub snapshot_id: String,
    /// Referenced pack identifiers in engine order; absent means none.
    #[serde(rename = "packs", default)]
    pub pack_ids: Vec<String>,
}

impl SnapshotManifest {
    /// Builds a manifest after validating the snapshot identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the snapshot identifier is invalid.
    pub fn new(snapshot_id: impl Into<String>, pack_ids: Vec<String>) -> Result<Self, ManifestError> {
        let manifest = Self {
            snapshot_id: snapshot_id.into(),
            pack_ids,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parses engine stdout into a manifest.
    ///
    /// The whole output is tried as a single JSON object first. When that
    /// fails, the output is treated as JSON lines and the last line carrying
    /// `snapshot` wins. A missing `packs` field is an empty pack list.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when no well-formed manifest is present.
    pub fn from_engine_output(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ManifestError::Parse("engine output must be utf-8".to_string()))?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ManifestError::Parse("engine output is empty".to_string()));
        }
        if let Ok(manifest) = serde_json::from_str::<Self>(trimmed) {
            manifest.validate()?;
            return Ok(manifest);
        }

        let mut found = None;
        for line in trimmed.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            if value.get("snapshot").is_some() {
                found = Some(value);
            }
        }
        let value = found.ok_or_else(|| {
            ManifestError::Parse("no object with a snapshot field".to_string())
        })?;
        let manifest: Self =
            serde_json::from_value(value).map_err(|err| ManifestError::Parse(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks structural invariants.
    fn validate(&self) -> Result<(), ManifestError> {
        let id = self.snapshot_id.trim();
        if id.is_empty() {
            return Err(ManifestError::Parse("snapshot id must be set".to_string()));
        }
        if id.len() != self.snapshot_id.len() || id.contains(['/', '\\']) {
            return Err(ManifestError::Parse("snapshot id contains invalid characters".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn parses_single_object() {
        let out = br#"{"snapshot":"abcd1234","packs":["ab12ef","cd34gh","ab12ef"]}"#;
        let manifest = SnapshotManifest::from_engine_output(out).unwrap();
        assert_eq!(manifest.snapshot_id, "abcd1234");
        assert_eq!(manifest.pack_ids, vec!["ab12ef", "cd34gh", "ab12ef"]);
    }

    #[test]
    fn ignores_unknown_fields() {
        let out = br#"{"message_type":"summary","snapshot":"s1","packs":[],"total_files":3}"#;
        let manifest = SnapshotManifest::from_engine_output(out).unwrap();
        assert_eq!(manifest.snapshot_id, "s1");
        assert!(manifest.pack_ids.is_empty());
    }

    #[test]
    fn falls_back_to_json_lines() {
        let out = b"{\"message_type\":\"status\",\"percent_done\":0.5}\n\
                    not json at all\n\
                    {\"snapshot\":\"s2\",\"packs\":[\"ff00\"]}\n";
        let manifest = SnapshotManifest::from_engine_output(out).unwrap();
        assert_eq!(manifest.snapshot_id, "s2");
        assert_eq!(manifest.pack_ids, vec!["ff00"]);
    }

    #[test]
    fn missing_packs_is_an_empty_pack_list() {
        let manifest = SnapshotManifest::from_engine_output(br#"{"snapshot":"s4"}"#).unwrap();
        assert_eq!(manifest.snapshot_id, "s4");
        assert!(manifest.pack_ids.is_empty());
    }

    #[test]
    fn json_lines_without_packs_yield_empty_pack_list() {
        let out = b"{\"message_type\":\"status\",\"percent_done\":1.0}\n\
                    {\"message_type\":\"summary\",\"snapshot\":\"s5\"}\n";
        let manifest = SnapshotManifest::from_engine_output(out).unwrap();
        assert_eq!(manifest.snapshot_id, "s5");
        assert!(manifest.pack_ids.is_empty());
    }

    #[test]
    fn rejects_empty_output() {
        let err = SnapshotManifest::from_engine_output(b"  \n").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn rejects_missing_snapshot() {
        assert!(SnapshotManifest::from_engine_output(br#"{"packs":["aa11"]}"#).is_err());
    }

    #[test]
    fn rejects_blank_snapshot_id() {
        assert!(SnapshotManifest::from_engine_output(br#"{"snapshot":"","packs":[]}"#).is_err());
    }

    #[test]
    fn rejects_snapshot_id_with_separator() {
        assert!(SnapshotManifest::new("../config", Vec::new()).is_err());
    }

    #[test]
    fn rejects_non_string_packs() {
        let out = br#"{"snapshot":"s3","packs":[1,2]}"#;
        assert!(SnapshotManifest::from_engine_output(out).is_err());
    }
}
