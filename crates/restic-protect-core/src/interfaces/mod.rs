// crates/restic-protect-core/src/interfaces/mod.rs
// ============================================================================
// Module: restic-protect Interfaces
// Description: Backend-agnostic seams for the store, engine, and credentials.
// Purpose: Define the contract surfaces used by the lock workflow runtime.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces keep the workflow independent of any particular S3 SDK, backup
//! engine binary, or credential source. Implementations are synchronous: each
//! call blocks the caller until the remote operation completes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

use crate::core::Credential;
use crate::core::ManifestError;
use crate::core::ObjectEntry;
use crate::core::RetentionRecord;
use crate::core::SnapshotManifest;
use crate::core::StorageKey;

// ============================================================================
// SECTION: Object Store Gateway
// ============================================================================

/// Object-store gateway errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Bucket has no usable object-lock configuration.
    #[error("object lock unavailable for bucket {bucket}: {reason}")]
    ObjectLockUnavailable {
        /// Bucket name.
        bucket: String,
        /// Reason reported by the store.
        reason: String,
    },
    /// Transport failure or unexpected service error.
    #[error("object store unavailable during {operation}: {cause}")]
    StoreUnavailable {
        /// Operation label.
        operation: &'static str,
        /// Underlying cause.
        cause: String,
    },
    /// Caller is not authorized for the operation.
    #[error("access denied during {operation}: {message}")]
    AccessDenied {
        /// Operation label.
        operation: &'static str,
        /// Message reported by the store.
        message: String,
    },
}

/// Lazy, finite, non-restartable listing of objects.
///
/// The iterator ending is the terminal signal; each item carries its own
/// error channel.
pub type ObjectListing<'a> = Box<dyn Iterator<Item = Result<ObjectEntry, GatewayError>> + 'a>;

/// Narrow capability interface over an S3-compatible object store.
pub trait ObjectStoreGateway {
    /// Reports whether object lock is enabled on the bucket.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ObjectLockUnavailable`] when the bucket has no
    /// object-lock configuration, or another [`GatewayError`] on failure.
    fn check_object_lock_enabled(&self, bucket: &str) -> Result<bool, GatewayError>;

    /// Lists objects under `prefix`.
    ///
    /// Entries equal to the prefix, or empty after stripping it, are skipped.
    fn list_objects<'a>(&'a self, bucket: &str, prefix: &str, recursive: bool)
    -> ObjectListing<'a>;

    /// Writes a retention record for a key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the write fails.
    fn put_retention(
        &self,
        bucket: &str,
        key: &StorageKey,
        record: &RetentionRecord,
        governance_bypass: bool,
    ) -> Result<(), GatewayError>;

    /// Reads the retention record of a key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the read fails or no record exists.
    fn get_retention(&self, bucket: &str, key: &StorageKey)
    -> Result<RetentionRecord, GatewayError>;
}

// ============================================================================
// SECTION: Manifest Source
// ============================================================================

/// Snapshot dependency extraction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Engine could not be started or exited unsuccessfully.
    #[error("backup engine invocation failed ({command}): {reason}")]
    EngineInvocationFailed {
        /// Engine command that was run.
        command: String,
        /// Failure detail (exit status, stderr excerpt, or spawn error).
        reason: String,
    },
    /// Engine output is not a well-formed manifest.
    #[error(transparent)]
    ManifestParse(#[from] ManifestError),
}

/// Source of the latest snapshot's dependency manifest.
pub trait ManifestSource {
    /// Produces the manifest for the latest snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the engine fails or its output is invalid.
    fn latest_manifest(&self) -> Result<SnapshotManifest, ExtractError>;
}

// ============================================================================
// SECTION: Credential Providers
// ============================================================================

/// A single failed provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    /// Provider label.
    pub provider: &'static str,
    /// Failure reason.
    pub reason: String,
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Credential resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// A single provider could not produce a credential.
    #[error("credential provider {provider} unavailable: {reason}")]
    Unavailable {
        /// Provider label.
        provider: &'static str,
        /// Failure reason.
        reason: String,
    },
    /// Every provider in the chain failed.
    #[error("no credential available (tried: {})", format_attempts(.attempts))]
    NoCredentialAvailable {
        /// Attempts in chain order.
        attempts: Vec<ProviderAttempt>,
    },
}

impl CredentialError {
    /// Builds an unavailable error for a provider.
    #[must_use]
    pub fn unavailable(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider,
            reason: reason.into(),
        }
    }
}

/// Renders provider attempts for error messages.
fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "none configured".to_string();
    }
    attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// A credential source tried by the resolver chain.
pub trait CredentialProvider {
    /// Stable provider label.
    fn name(&self) -> &'static str;

    /// Attempts to resolve a credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Unavailable`] when this provider has nothing
    /// to offer.
    fn resolve(&self) -> Result<Credential, CredentialError>;
}
