// crates/restic-protect-core/tests/workflow.rs
// ============================================================================
// Module: Protect Workflow Tests
// Description: End-to-end lock pipeline against the in-memory gateway.
// Purpose: Validate stage ordering, lock sets, and abort reporting.
// ============================================================================

//! ## Overview
//! Drives [`ProtectWorkflow`] over [`InMemoryObjectStore`] and a fixed
//! manifest source, asserting both the resulting locks and the exact gateway
//! call log.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::cell::Cell;
use std::sync::Mutex;

use restic_protect_core::ErrorKind;
use restic_protect_core::ExtractError;
use restic_protect_core::GatewayError;
use restic_protect_core::ManifestSource;
use restic_protect_core::ProtectAuditSink;
use restic_protect_core::ProtectError;
use restic_protect_core::ProtectWorkflow;
use restic_protect_core::RepositoryLocation;
use restic_protect_core::RetentionMode;
use restic_protect_core::RetentionRecord;
use restic_protect_core::SnapshotManifest;
use restic_protect_core::StorageKey;
use restic_protect_core::runtime::GatewayCall;
use restic_protect_core::runtime::InMemoryObjectStore;
use restic_protect_core::runtime::NoopAuditSink;
use restic_protect_core::runtime::ObjectLockState;
use restic_protect_core::runtime::RetentionAuditEvent;
use restic_protect_core::runtime::RunSummaryEvent;
use restic_protect_core::runtime::StageAuditEvent;
use serde_json::Value;
use time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Bucket used by every fixture.
const BUCKET: &str = "backups";

/// Manifest source returning a fixed result and counting calls.
struct FixedManifest {
    /// Result handed out on every call.
    result: Result<SnapshotManifest, ExtractError>,
    /// Number of calls made.
    calls: Cell<usize>,
}

impl FixedManifest {
    /// Source yielding `snapshot` with `packs`.
    fn ok(snapshot: &str, packs: &[&str]) -> Self {
        Self {
            result: Ok(SnapshotManifest::new(
                snapshot,
                packs.iter().map(ToString::to_string).collect(),
            )
            .unwrap()),
            calls: Cell::new(0),
        }
    }

    /// Source failing with `err`.
    fn failing(err: ExtractError) -> Self {
        Self {
            result: Err(err),
            calls: Cell::new(0),
        }
    }
}

impl ManifestSource for FixedManifest {
    fn latest_manifest(&self) -> Result<SnapshotManifest, ExtractError> {
        self.calls.set(self.calls.get() + 1);
        self.result.clone()
    }
}

/// Audit sink capturing serialized events.
#[derive(Default)]
struct RecordingAudit {
    /// Captured events in order.
    events: Mutex<Vec<Value>>,
}

impl RecordingAudit {
    /// Returns the `event` field of each captured event, with stage suffix.
    fn labels(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| match event["stage"].as_str() {
                Some(stage) => format!("{}:{stage}", event["event"].as_str().unwrap()),
                None => event["event"].as_str().unwrap().to_string(),
            })
            .collect()
    }

    /// Returns the last captured event.
    fn last(&self) -> Value {
        self.events.lock().unwrap().last().cloned().unwrap()
    }
}

impl ProtectAuditSink for RecordingAudit {
    fn record_stage(&self, event: &StageAuditEvent) {
        self.events.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }

    fn record_retention(&self, event: &RetentionAuditEvent) {
        self.events.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }

    fn record_summary(&self, event: &RunSummaryEvent) {
        self.events.lock().unwrap().push(serde_json::to_value(event).unwrap());
    }
}

/// Run start instant shared by the fixtures.
fn now() -> OffsetDateTime {
    datetime!(2026-01-01 00:00:00.750 UTC)
}

/// Store holding a full repository under `prefix`.
fn repository_store(prefix: &str, lock: ObjectLockState) -> InMemoryObjectStore {
    let key = |rest: &str| StorageKey::join(prefix, &[rest]).to_string();
    let keys = [
        key("snapshots/abc123"),
        key("config"),
        key("keys/"),
        key("keys/k1"),
        key("keys/k2"),
        key("keys/nested/ignored"),
        key("data/aa/aa11"),
        key("data/bb/bb22"),
        key("data/cc/cc33"),
    ];
    let keys_marker = if prefix.is_empty() { "keys/".to_string() } else { format!("{prefix}/keys/") };
    InMemoryObjectStore::new()
        .with_bucket(BUCKET, lock)
        .with_objects(BUCKET, keys.iter().map(String::as_str))
        .with_object(BUCKET, &keys_marker)
}

/// Keys locked by a receipt list.
fn locked_keys(store: &InMemoryObjectStore) -> Vec<String> {
    store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            GatewayCall::PutRetention {
                key, ..
            } => Some(key),
            _ => None,
        })
        .collect()
}

// ============================================================================
// SECTION: Full Runs
// ============================================================================

#[test]
fn locks_full_dependency_set_under_prefix() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &["aa11", "bb22"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let mut observed = Vec::new();
    let report =
        workflow.run(&location, now(), |receipt| observed.push(receipt.key.to_string())).unwrap();

    let expected = vec![
        "repo/snapshots/abc123",
        "repo/config",
        "repo/keys/k1",
        "repo/keys/k2",
        "repo/data/aa/aa11",
        "repo/data/bb/bb22",
    ];
    let reported: Vec<String> = report.receipts.iter().map(|r| r.key.to_string()).collect();
    assert_eq!(reported, expected);
    assert_eq!(observed, expected);
    assert_eq!(locked_keys(&store), expected);

    let requested = RetentionRecord {
        mode: RetentionMode::Governance,
        retain_until: datetime!(2026-01-02 01:00:00 UTC),
    };
    for key in &expected {
        assert_eq!(store.retention(BUCKET, key), Some(requested));
    }
    assert_eq!(store.retention(BUCKET, "repo/data/cc/cc33"), None);
}

#[test]
fn empty_prefix_produces_no_leading_separator() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups").unwrap();
    let store = repository_store("", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &["aa11"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let report = workflow.run(&location, now(), |_| {}).unwrap();

    let keys: Vec<String> = report.receipts.iter().map(|r| r.key.to_string()).collect();
    assert_eq!(keys, vec!["snapshots/abc123", "config", "keys/k1", "keys/k2", "data/aa/aa11"]);
    assert!(keys.iter().all(|key| !key.starts_with('/') && !key.contains("//")));
}

#[test]
fn key_listing_is_non_recursive_under_trailing_slash_prefix() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &[]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    workflow.run(&location, now(), |_| {}).unwrap();

    let listings: Vec<GatewayCall> = store
        .calls()
        .into_iter()
        .filter(|call| matches!(call, GatewayCall::ListObjects { .. }))
        .collect();
    assert_eq!(listings, vec![GatewayCall::ListObjects {
        bucket: BUCKET.to_string(),
        prefix: "repo/keys/".to_string(),
        recursive: false,
    }]);
    let locked = locked_keys(&store);
    assert!(!locked.contains(&"repo/keys/".to_string()));
    assert!(!locked.contains(&"repo/keys/nested/ignored".to_string()));
}

#[test]
fn duplicate_pack_ids_are_locked_twice() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &["aa11", "aa11"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let report = workflow.run(&location, now(), |_| {}).unwrap();

    let packs = report.receipts.iter().filter(|r| r.key.as_str() == "repo/data/aa/aa11").count();
    assert_eq!(packs, 2);
}

#[test]
fn relocking_extends_retention_monotonically() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &["aa11"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let first = workflow.run(&location, now(), |_| {}).unwrap();
    let again = workflow.run(&location, now(), |_| {}).unwrap();
    let later = workflow.run(&location, now() + Duration::hours(1), |_| {}).unwrap();

    for ((a, b), c) in first.receipts.iter().zip(&again.receipts).zip(&later.receipts) {
        assert_eq!(a.confirmed, b.confirmed);
        assert!(c.confirmed.retain_until >= b.confirmed.retain_until);
    }
}

// ============================================================================
// SECTION: Early Aborts
// ============================================================================

#[test]
fn disabled_object_lock_aborts_before_any_other_call() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Disabled);
    let manifest = FixedManifest::ok("abc123", &["aa11"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let err = workflow.run(&location, now(), |_| {}).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ObjectLockUnavailable);
    assert!(matches!(err, ProtectError::ObjectLockCheck(_)));
    assert_eq!(store.calls(), vec![GatewayCall::CheckObjectLock {
        bucket: BUCKET.to_string(),
    }]);
    assert_eq!(manifest.calls.get(), 0);
}

#[test]
fn missing_object_lock_configuration_aborts() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Missing);
    let manifest = FixedManifest::ok("abc123", &["aa11"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let err = workflow.run(&location, now(), |_| {}).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ObjectLockUnavailable);
    assert!(store.calls().iter().all(|call| !call.touches_objects()));
    assert_eq!(manifest.calls.get(), 0);
}

#[test]
fn engine_failure_aborts_before_listing_or_locking() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::failing(ExtractError::EngineInvocationFailed {
        command: "restic".to_string(),
        reason: "exited with exit status: 1".to_string(),
    });
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let err = workflow.run(&location, now(), |_| {}).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EngineInvocationFailed);
    assert_eq!(err.kind().as_str(), "engine_invocation_failed");
    assert!(store.calls().iter().all(|call| !call.touches_objects()));
    assert_eq!(manifest.calls.get(), 1);
}

#[test]
fn short_pack_id_aborts_before_locking() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &["aa11", "a"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let err = workflow.run(&location, now(), |_| {}).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidPackId);
    assert!(locked_keys(&store).is_empty());
}

#[test]
fn listing_failure_is_reported_at_list_stage() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled).failing_listing(
        1,
        GatewayError::StoreUnavailable {
            operation: "list_objects_v2",
            cause: "connection reset".to_string(),
        },
    );
    let manifest = FixedManifest::ok("abc123", &["aa11"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let err = workflow.run(&location, now(), |_| {}).unwrap_err();

    assert!(matches!(err, ProtectError::ListKeys(_)));
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    assert!(locked_keys(&store).is_empty());
}

// ============================================================================
// SECTION: Mid-Run Aborts
// ============================================================================

#[test]
fn mid_run_failure_reports_locked_and_pending_keys() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled).failing_put(
        "repo/data/aa/aa11",
        GatewayError::AccessDenied {
            operation: "put_object_retention",
            message: "AccessDenied".to_string(),
        },
    );
    let manifest = FixedManifest::ok("abc123", &["aa11", "bb22"]);
    let audit = RecordingAudit::default();
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let err = workflow.run(&location, now(), |_| {}).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    let apply = err.apply_error().unwrap();
    let locked: Vec<&str> = apply.locked.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(locked, vec!["repo/snapshots/abc123", "repo/config", "repo/keys/k1", "repo/keys/k2"]);
    assert_eq!(apply.failed_key.as_str(), "repo/data/aa/aa11");
    assert_eq!(apply.pending, vec![StorageKey::new("repo/data/bb/bb22")]);
    assert_eq!(apply.unlocked_count(), 2);
    assert_eq!(store.retention(BUCKET, "repo/data/bb/bb22"), None);

    let summary = audit.last();
    assert_eq!(summary["event"], "run_summary");
    assert_eq!(summary["locked"], 4);
    assert_eq!(summary["pending"], 2);
    assert_eq!(summary["error_kind"], "access_denied");
}

#[test]
fn unconfirmed_readback_aborts_with_retention_not_confirmed() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled).overriding_readback(
        "repo/config",
        RetentionRecord {
            mode: RetentionMode::Governance,
            retain_until: datetime!(2026-01-01 12:00:00 UTC),
        },
    );
    let manifest = FixedManifest::ok("abc123", &["aa11"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let err = workflow.run(&location, now(), |_| {}).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RetentionNotConfirmed);
    let apply = err.apply_error().unwrap();
    assert_eq!(apply.locked.len(), 1);
    assert_eq!(apply.failed_key.as_str(), "repo/config");
}

// ============================================================================
// SECTION: Planning And Audit
// ============================================================================

#[test]
fn plan_lists_keys_without_locking() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &["bb22"]);
    let audit = NoopAuditSink;
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    let keys = workflow.plan(&location).unwrap();

    let keys: Vec<&str> = keys.iter().map(StorageKey::as_str).collect();
    assert_eq!(keys, vec![
        "repo/snapshots/abc123",
        "repo/config",
        "repo/keys/k1",
        "repo/keys/k2",
        "repo/data/bb/bb22"
    ]);
    assert!(locked_keys(&store).is_empty());
}

#[test]
fn successful_run_emits_stage_events_in_order() {
    let location = RepositoryLocation::parse("s3:https://minio.local/backups/repo").unwrap();
    let store = repository_store("repo", ObjectLockState::Enabled);
    let manifest = FixedManifest::ok("abc123", &[]);
    let audit = RecordingAudit::default();
    let workflow = ProtectWorkflow::new(&store, &manifest, &audit);

    workflow.run(&location, now(), |_| {}).unwrap();

    assert_eq!(audit.labels(), vec![
        "stage_audit:object_lock_check",
        "stage_audit:extract",
        "stage_audit:list_keys",
        "stage_audit:build_object_set",
        "retention_audit",
        "retention_audit",
        "retention_audit",
        "retention_audit",
        "stage_audit:apply_retention",
        "run_summary",
    ]);
    let summary = audit.last();
    assert_eq!(summary["outcome"], "ok");
    assert_eq!(summary["locked"], 4);
}
