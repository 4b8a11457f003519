// crates/restic-protect-cli/src/wiring.rs
// ============================================================================
// Module: CLI Wiring
// Description: Builds runtime components from the effective configuration.
// Purpose: Keep construction testable and out of the binary entry point.
// Dependencies: restic-protect-config, restic-protect-core, restic-protect-store-s3
// ============================================================================

//! ## Overview
//! Each helper maps one configuration section onto the component it selects:
//! the credential chain, the audit sink, the engine handle, and the
//! repository location. Nothing here touches the network.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use restic_protect_config::AuditConfig;
use restic_protect_config::AuditSinkKind;
use restic_protect_config::CredentialProviderKind;
use restic_protect_config::ProtectConfig;
use restic_protect_core::CredentialProvider;
use restic_protect_core::CredentialResolver;
use restic_protect_core::EnvSource;
use restic_protect_core::LockReceipt;
use restic_protect_core::ProtectAuditSink;
use restic_protect_core::ProtectError;
use restic_protect_core::RepositoryLocation;
use restic_protect_core::ResticDryRun;
use restic_protect_core::runtime::EnvAwsProvider;
use restic_protect_core::runtime::EnvMinioProvider;
use restic_protect_core::runtime::FileAuditSink;
use restic_protect_core::runtime::MinioClientFileProvider;
use restic_protect_core::runtime::NoopAuditSink;
use restic_protect_core::runtime::StderrAuditSink;
use restic_protect_store_s3::AwsProfileFileProvider;
use restic_protect_store_s3::InstanceMetadataProvider;
use thiserror::Error;

use crate::t;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while building runtime components.
#[derive(Debug, Error)]
pub enum WiringError {
    /// File sink selected without a path.
    #[error("audit sink \"file\" needs a path (set --audit-path or audit.path)")]
    AuditPathRequired,
    /// Audit log could not be opened.
    #[error("failed to open audit log at {}: {source}", .path.display())]
    AuditOpen {
        /// Audit log path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Builds the provider for one chain entry.
///
/// `env` pins the local providers; the SDK-backed `aws_file` and
/// `instance_metadata` links read the process environment themselves.
#[must_use]
pub fn credential_provider(
    kind: CredentialProviderKind,
    env: &EnvSource,
) -> Box<dyn CredentialProvider> {
    match kind {
        CredentialProviderKind::EnvAws => Box::new(EnvAwsProvider::new(env.clone())),
        CredentialProviderKind::EnvMinio => Box::new(EnvMinioProvider::new(env.clone())),
        CredentialProviderKind::AwsFile => Box::new(AwsProfileFileProvider::new()),
        CredentialProviderKind::MinioFile => Box::new(MinioClientFileProvider::new(env.clone())),
        CredentialProviderKind::InstanceMetadata => Box::new(InstanceMetadataProvider::new()),
    }
}

/// Builds the ordered credential chain.
#[must_use]
pub fn credential_resolver(kinds: &[CredentialProviderKind], env: &EnvSource) -> CredentialResolver {
    CredentialResolver::new(kinds.iter().map(|kind| credential_provider(*kind, env)).collect())
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Opens the configured audit sink.
///
/// # Errors
///
/// Returns [`WiringError`] when the file sink has no path or cannot be opened.
pub fn audit_sink(config: &AuditConfig) -> Result<Box<dyn ProtectAuditSink>, WiringError> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Box::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Box::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config.path.as_ref().ok_or(WiringError::AuditPathRequired)?;
            let sink = FileAuditSink::new(path).map_err(|source| WiringError::AuditOpen {
                path: path.clone(),
                source,
            })?;
            Ok(Box::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Engine and Location
// ============================================================================

/// Builds the dry-run engine handle from `[engine]`.
#[must_use]
pub fn manifest_source(config: &ProtectConfig) -> ResticDryRun {
    ResticDryRun::new(config.engine_command())
        .with_target(config.engine.dry_run_target.clone())
        .with_max_manifest_bytes(config.engine.max_manifest_bytes)
}

/// Parses the effective repository location, tagged with the locate stage.
///
/// # Errors
///
/// Returns [`ProtectError::Location`] when the location is missing or malformed.
pub fn repository_location(config: &ProtectConfig) -> Result<RepositoryLocation, ProtectError> {
    Ok(config.repository_location()?)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Renders one confirmed lock as an output line.
#[must_use]
pub fn lock_line(receipt: &LockReceipt) -> String {
    t!(
        "run.lock.entry",
        key = receipt.key,
        mode = receipt.confirmed.mode,
        until = receipt.confirmed.retain_until_rfc3339()
    )
}
