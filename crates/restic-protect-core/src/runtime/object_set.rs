// crates/restic-protect-core/src/runtime/object_set.rs
// ============================================================================
// Module: Object Set Builder
// Description: Derives every storage key the latest snapshot depends on.
// Purpose: Map manifest + key-material listing into the ordered lock set.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The lock set is, in order:
//! 1. `{prefix}/snapshots/{snapshot_id}`
//! 2. `{prefix}/config`
//! 3. every key-material object listed under `{prefix}/keys/`
//! 4. `{prefix}/data/{id[0..2]}/{id}` for every pack id in manifest order
//!
//! Duplicate pack ids are kept; re-locking a key is idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ObjectEntry;
use crate::core::SnapshotManifest;
use crate::core::StorageKey;
use crate::core::listing_entry_name;
use crate::interfaces::GatewayError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of leading pack-id characters used as the shard directory.
const SHARD_WIDTH: usize = 2;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Object set construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Pack identifier is too short to derive a shard.
    #[error("invalid pack id \"{pack_id}\": must be at least two characters")]
    InvalidPackId {
        /// Offending pack identifier.
        pack_id: String,
    },
    /// Key-material listing failed.
    #[error(transparent)]
    Listing(#[from] GatewayError),
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds the ordered set of keys to lock.
///
/// `key_material_prefix` is the prefix the listing was taken under and is used
/// to drop directory-marker entries.
///
/// # Errors
///
/// Returns [`BuildError::Listing`] on the first failed listing item and
/// [`BuildError::InvalidPackId`] for a pack id shorter than two characters.
pub fn build_object_set<I>(
    prefix: &str,
    manifest: &SnapshotManifest,
    key_material_prefix: &str,
    key_listing: I,
) -> Result<Vec<StorageKey>, BuildError>
where
    I: IntoIterator<Item = Result<ObjectEntry, GatewayError>>,
{
    let mut keys = vec![
        StorageKey::join(prefix, &["snapshots", &manifest.snapshot_id]),
        StorageKey::join(prefix, &["config"]),
    ];

    for entry in key_listing {
        let entry = entry?;
        if listing_entry_name(key_material_prefix, &entry.key).is_none() {
            continue;
        }
        keys.push(StorageKey::new(&entry.key));
    }

    for pack_id in &manifest.pack_ids {
        keys.push(pack_key(prefix, pack_id)?);
    }

    Ok(keys)
}

/// Derives the sharded data key for a pack.
///
/// # Errors
///
/// Returns [`BuildError::InvalidPackId`] when no two-character shard exists.
pub fn pack_key(prefix: &str, pack_id: &str) -> Result<StorageKey, BuildError> {
    let shard = pack_id.get(.. SHARD_WIDTH).filter(|shard| !shard.contains('/')).ok_or_else(|| {
        BuildError::InvalidPackId {
            pack_id: pack_id.to_string(),
        }
    })?;
    Ok(StorageKey::join(prefix, &["data", shard, pack_id]))
}
