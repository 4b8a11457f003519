// crates/restic-protect-core/src/core/mod.rs
// ============================================================================
// Module: restic-protect Core Types
// Description: Location, manifest, key, credential, and retention models.
// Purpose: Provide the shared data model for the lock workflow.
// Dependencies: serde, time, thiserror
// ============================================================================

//! ## Overview
//! Core types are plain data with validation at construction. They perform no
//! I/O; interfaces and runtime helpers build on them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod credentials;
pub mod keys;
pub mod location;
pub mod manifest;
pub mod retention;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use credentials::Credential;
pub use keys::ObjectEntry;
pub use keys::StorageKey;
pub use keys::listing_entry_name;
pub use location::DEFAULT_REGION;
pub use location::LocationError;
pub use location::RepositoryLocation;
pub use manifest::ManifestError;
pub use manifest::SnapshotManifest;
pub use retention::LockReceipt;
pub use retention::LockReport;
pub use retention::RETENTION_WINDOW;
pub use retention::RetentionMode;
pub use retention::RetentionPolicy;
pub use retention::RetentionRecord;
