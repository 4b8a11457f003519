// crates/restic-protect-core/src/lib.rs
// ============================================================================
// Module: restic-protect Core Library
// Description: Public API surface for the restic-protect core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! restic-protect places a time-bounded S3 object lock on every object the
//! latest restic snapshot depends on: the snapshot record, the repository
//! config, all key material, and every referenced data pack. Locks use
//! governance mode for 25 hours and are confirmed by read-back.
//!
//! The core is backend-agnostic. Object storage, the backup engine, and
//! credential sources plug in through [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::CredentialError;
pub use interfaces::CredentialProvider;
pub use interfaces::ExtractError;
pub use interfaces::GatewayError;
pub use interfaces::ManifestSource;
pub use interfaces::ObjectListing;
pub use interfaces::ObjectStoreGateway;
pub use interfaces::ProviderAttempt;
pub use runtime::ApplyError;
pub use runtime::BuildError;
pub use runtime::CredentialResolver;
pub use runtime::EnvSource;
pub use runtime::ErrorKind;
pub use runtime::InMemoryObjectStore;
pub use runtime::KeyLockError;
pub use runtime::ProtectAuditSink;
pub use runtime::ProtectError;
pub use runtime::ProtectWorkflow;
pub use runtime::ResticDryRun;
pub use runtime::RetentionApplier;
pub use runtime::build_object_set;
