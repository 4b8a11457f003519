// crates/restic-protect-core/src/runtime/mod.rs
// ============================================================================
// Module: restic-protect Runtime
// Description: Lock workflow runtime and built-in adapters.
// Purpose: Expose the workflow, applier, extractor, and credential chain.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime helpers implement the lock pipeline on top of the interfaces. The
//! S3 gateway and instance-metadata credentials live in
//! `restic-protect-store-s3`; everything here is synchronous and SDK-free.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod applier;
pub mod audit;
pub mod credential_chain;
pub mod engine;
pub mod memory;
pub mod object_set;
pub mod workflow;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use applier::ApplyError;
pub use applier::KeyLockError;
pub use applier::RetentionApplier;
pub use audit::AuditOutcome;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::ProtectAuditSink;
pub use audit::RetentionAuditEvent;
pub use audit::RunSummaryEvent;
pub use audit::Stage;
pub use audit::StageAuditEvent;
pub use audit::StderrAuditSink;
pub use credential_chain::CredentialResolver;
pub use credential_chain::EnvAwsProvider;
pub use credential_chain::EnvMinioProvider;
pub use credential_chain::EnvSource;
pub use credential_chain::MinioClientFileProvider;
pub use engine::DEFAULT_DRY_RUN_TARGET;
pub use engine::DEFAULT_ENGINE_COMMAND;
pub use engine::DEFAULT_MAX_MANIFEST_BYTES;
pub use engine::ENGINE_COMMAND_ENV;
pub use engine::ResticDryRun;
pub use memory::GatewayCall;
pub use memory::InMemoryObjectStore;
pub use memory::ObjectLockState;
pub use object_set::BuildError;
pub use object_set::build_object_set;
pub use object_set::pack_key;
pub use workflow::ErrorKind;
pub use workflow::ProtectError;
pub use workflow::ProtectWorkflow;
pub use workflow::record_stage_failure;
