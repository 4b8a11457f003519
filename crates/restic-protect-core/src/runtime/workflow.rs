// crates/restic-protect-core/src/runtime/workflow.rs
// ============================================================================
// Module: Protect Workflow
// Description: Orchestrates check, extract, list, build, and apply stages.
// Purpose: Run the full lock pipeline against injected gateway and engine.
// Dependencies: crate::core, crate::interfaces, crate::runtime, thiserror, time
// ============================================================================

//! ## Overview
//! The workflow runs strictly in order and stops at the first failure:
//! 1. object-lock check (before any other store call)
//! 2. manifest extraction (before any listing or lock call)
//! 3. key-material listing
//! 4. object set construction
//! 5. retention application
//!
//! Each stage emits a `stage_audit` event and every run ends with a
//! `run_summary` event. [`ProtectError`] names the stage that failed and maps
//! to a stable [`ErrorKind`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::LocationError;
use crate::core::LockReceipt;
use crate::core::LockReport;
use crate::core::ObjectEntry;
use crate::core::RepositoryLocation;
use crate::core::RetentionPolicy;
use crate::core::StorageKey;
use crate::interfaces::CredentialError;
use crate::interfaces::ExtractError;
use crate::interfaces::GatewayError;
use crate::interfaces::ManifestSource;
use crate::interfaces::ObjectStoreGateway;
use crate::runtime::applier::ApplyError;
use crate::runtime::applier::KeyLockError;
use crate::runtime::applier::RetentionApplier;
use crate::runtime::audit::AuditOutcome;
use crate::runtime::audit::ProtectAuditSink;
use crate::runtime::audit::RetentionAuditEvent;
use crate::runtime::audit::RunSummaryEvent;
use crate::runtime::audit::Stage;
use crate::runtime::audit::StageAuditEvent;
use crate::runtime::object_set::BuildError;
use crate::runtime::object_set::build_object_set;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Stable classification of workflow failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Repository location could not be parsed.
    MalformedLocation,
    /// No credential provider succeeded.
    NoCredentialAvailable,
    /// Bucket object lock missing or disabled.
    ObjectLockUnavailable,
    /// Engine could not run or failed.
    EngineInvocationFailed,
    /// Engine output was not a manifest.
    ManifestParseError,
    /// Pack id too short to shard.
    InvalidPackId,
    /// Store transport or service failure.
    StoreUnavailable,
    /// Store denied the operation.
    AccessDenied,
    /// Read-back did not honor the requested lock.
    RetentionNotConfirmed,
}

impl ErrorKind {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedLocation => "malformed_location",
            Self::NoCredentialAvailable => "no_credential_available",
            Self::ObjectLockUnavailable => "object_lock_unavailable",
            Self::EngineInvocationFailed => "engine_invocation_failed",
            Self::ManifestParseError => "manifest_parse_error",
            Self::InvalidPackId => "invalid_pack_id",
            Self::StoreUnavailable => "store_unavailable",
            Self::AccessDenied => "access_denied",
            Self::RetentionNotConfirmed => "retention_not_confirmed",
        }
    }

    /// Classifies a gateway error.
    #[must_use]
    pub const fn of_gateway(err: &GatewayError) -> Self {
        match err {
            GatewayError::ObjectLockUnavailable {
                ..
            } => Self::ObjectLockUnavailable,
            GatewayError::StoreUnavailable {
                ..
            } => Self::StoreUnavailable,
            GatewayError::AccessDenied {
                ..
            } => Self::AccessDenied,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Workflow failure tagged with its stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtectError {
    /// Repository location parsing failed.
    #[error("locate: {0}")]
    Location(#[from] LocationError),
    /// Credential resolution failed.
    #[error("credentials: {0}")]
    Credentials(#[from] CredentialError),
    /// Object-lock check failed.
    #[error("object_lock_check: {0}")]
    ObjectLockCheck(GatewayError),
    /// Manifest extraction failed.
    #[error("extract: {0}")]
    Extract(#[from] ExtractError),
    /// Key-material listing failed.
    #[error("list_keys: {0}")]
    ListKeys(GatewayError),
    /// Object set construction failed.
    #[error("build_object_set: {0}")]
    Build(BuildError),
    /// Retention application aborted.
    #[error("apply_retention: {0}")]
    Apply(Box<ApplyError>),
}

impl ProtectError {
    /// Returns the failing stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Location(_) => Stage::Locate,
            Self::Credentials(_) => Stage::Credentials,
            Self::ObjectLockCheck(_) => Stage::ObjectLockCheck,
            Self::Extract(_) => Stage::Extract,
            Self::ListKeys(_) => Stage::ListKeys,
            Self::Build(_) => Stage::BuildObjectSet,
            Self::Apply(_) => Stage::ApplyRetention,
        }
    }

    /// Returns the stable error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Location(_) => ErrorKind::MalformedLocation,
            Self::Credentials(_) => ErrorKind::NoCredentialAvailable,
            Self::ObjectLockCheck(err) | Self::ListKeys(err) => ErrorKind::of_gateway(err),
            Self::Extract(ExtractError::EngineInvocationFailed {
                ..
            }) => ErrorKind::EngineInvocationFailed,
            Self::Extract(ExtractError::ManifestParse(_)) => ErrorKind::ManifestParseError,
            Self::Build(BuildError::InvalidPackId {
                ..
            }) => ErrorKind::InvalidPackId,
            Self::Build(BuildError::Listing(err)) => ErrorKind::of_gateway(err),
            Self::Apply(err) => match err.source.as_ref() {
                KeyLockError::Gateway(err) => ErrorKind::of_gateway(err),
                KeyLockError::RetentionNotConfirmed {
                    ..
                } => ErrorKind::RetentionNotConfirmed,
            },
        }
    }

    /// Returns the partial apply report when locking aborted mid-run.
    #[must_use]
    pub fn apply_error(&self) -> Option<&ApplyError> {
        match self {
            Self::Apply(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<BuildError> for ProtectError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Listing(err) => Self::ListKeys(err),
            other => Self::Build(other),
        }
    }
}

impl From<ApplyError> for ProtectError {
    fn from(err: ApplyError) -> Self {
        Self::Apply(Box::new(err))
    }
}

// ============================================================================
// SECTION: Workflow
// ============================================================================

/// Lock pipeline over an injected gateway, manifest source, and audit sink.
pub struct ProtectWorkflow<'a, G: ObjectStoreGateway + ?Sized, M: ManifestSource + ?Sized> {
    /// Object-store gateway.
    gateway: &'a G,
    /// Snapshot manifest source.
    manifest_source: &'a M,
    /// Audit sink.
    audit: &'a dyn ProtectAuditSink,
    /// Retention policy (fixed defaults).
    policy: RetentionPolicy,
}

impl<'a, G: ObjectStoreGateway + ?Sized, M: ManifestSource + ?Sized> ProtectWorkflow<'a, G, M> {
    /// Creates a workflow using the default retention policy.
    #[must_use]
    pub fn new(gateway: &'a G, manifest_source: &'a M, audit: &'a dyn ProtectAuditSink) -> Self {
        Self {
            gateway,
            manifest_source,
            audit,
            policy: RetentionPolicy::default(),
        }
    }

    /// Runs the full pipeline, reporting each confirmed lock to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectError`] tagged with the first failing stage.
    pub fn run<F>(
        &self,
        location: &RepositoryLocation,
        now: OffsetDateTime,
        mut observer: F,
    ) -> Result<LockReport, ProtectError>
    where
        F: FnMut(&LockReceipt),
    {
        let keys = match self.prepare(location) {
            Ok(keys) => keys,
            Err(err) => {
                self.summarize(0, 0, Some(&err));
                return Err(err);
            }
        };

        let applier = RetentionApplier::new(self.gateway, location.bucket(), self.policy);
        let result = applier.apply_all(&keys, now, |receipt| {
            self.audit.record_retention(&RetentionAuditEvent::from_receipt(receipt));
            observer(receipt);
        });
        match result {
            Ok(report) => {
                self.stage_ok(Stage::ApplyRetention, Some(format!("{} keys locked", report.len())));
                self.summarize(report.len(), 0, None);
                Ok(report)
            }
            Err(err) => {
                let locked = err.locked.len();
                let unlocked = err.unlocked_count();
                let err = ProtectError::from(err);
                self.stage_failed(&err);
                self.summarize(locked, unlocked, Some(&err));
                Err(err)
            }
        }
    }

    /// Runs stages 1 to 4 and returns the keys that would be locked.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectError`] tagged with the first failing stage.
    pub fn plan(&self, location: &RepositoryLocation) -> Result<Vec<StorageKey>, ProtectError> {
        self.prepare(location)
    }

    /// Check, extract, list, and build.
    fn prepare(&self, location: &RepositoryLocation) -> Result<Vec<StorageKey>, ProtectError> {
        let bucket = location.bucket();

        let enabled = self
            .gateway
            .check_object_lock_enabled(bucket)
            .map_err(ProtectError::ObjectLockCheck)
            .and_then(|enabled| {
                if enabled {
                    Ok(())
                } else {
                    Err(ProtectError::ObjectLockCheck(GatewayError::ObjectLockUnavailable {
                        bucket: bucket.to_string(),
                        reason: "object lock is not enabled".to_string(),
                    }))
                }
            });
        self.track(Stage::ObjectLockCheck, enabled, |_| None)?;

        let manifest = self.manifest_source.latest_manifest().map_err(ProtectError::from);
        let manifest = self.track(Stage::Extract, manifest, |manifest| {
            Some(format!(
                "snapshot {} with {} packs",
                manifest.snapshot_id,
                manifest.pack_ids.len()
            ))
        })?;

        let key_prefix = location.key_material_prefix();
        let entries = self
            .gateway
            .list_objects(bucket, &key_prefix, false)
            .collect::<Result<Vec<ObjectEntry>, GatewayError>>()
            .map_err(ProtectError::ListKeys);
        let entries = self.track(Stage::ListKeys, entries, |entries| {
            Some(format!("{} key objects", entries.len()))
        })?;

        let listing = entries.into_iter().map(Ok);
        let keys = build_object_set(location.prefix(), &manifest, &key_prefix, listing)
            .map_err(ProtectError::from);
        self.track(Stage::BuildObjectSet, keys, |keys| Some(format!("{} keys", keys.len())))
    }

    /// Records the stage outcome and passes the result through.
    fn track<T>(
        &self,
        stage: Stage,
        result: Result<T, ProtectError>,
        detail: impl FnOnce(&T) -> Option<String>,
    ) -> Result<T, ProtectError> {
        match &result {
            Ok(value) => self.stage_ok(stage, detail(value)),
            Err(err) => self.stage_failed(err),
        }
        result
    }

    /// Records a successful stage.
    fn stage_ok(&self, stage: Stage, detail: Option<String>) {
        self.audit.record_stage(&StageAuditEvent::new(stage, AuditOutcome::Ok, None, detail));
    }

    /// Records a failed stage.
    fn stage_failed(&self, err: &ProtectError) {
        record_stage_failure(self.audit, err);
    }

    /// Records the run summary.
    fn summarize(&self, locked: usize, pending: usize, err: Option<&ProtectError>) {
        let outcome = if err.is_some() { AuditOutcome::Error } else { AuditOutcome::Ok };
        self.audit.record_summary(&RunSummaryEvent::new(
            locked,
            pending,
            outcome,
            err.map(|err| err.kind().as_str()),
        ));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Records a failed stage event for an error raised outside the workflow.
pub fn record_stage_failure(audit: &dyn ProtectAuditSink, err: &ProtectError) {
    audit.record_stage(&StageAuditEvent::new(
        err.stage(),
        AuditOutcome::Error,
        Some(err.kind().as_str()),
        Some(err.to_string()),
    ));
}
