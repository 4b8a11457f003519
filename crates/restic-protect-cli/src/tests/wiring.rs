// crates/restic-protect-cli/src/tests/wiring.rs
// ============================================================================
// Module: CLI Wiring Tests
// Description: Unit tests for config-to-component construction.
// Purpose: Ensure the chain, sink, engine, and location follow configuration.
// Dependencies: restic-protect-cli wiring module, tempfile
// ============================================================================

//! ## Overview
//! Exercises the wiring helpers without any network access.

use std::fs;
use std::path::PathBuf;

use restic_protect_config::AuditConfig;
use restic_protect_config::AuditSinkKind;
use restic_protect_config::CredentialProviderKind;
use restic_protect_config::ProtectConfig;
use restic_protect_core::EnvSource;
use restic_protect_core::ErrorKind;
use restic_protect_core::LockReceipt;
use restic_protect_core::RetentionMode;
use restic_protect_core::RetentionRecord;
use restic_protect_core::StorageKey;
use restic_protect_core::runtime::AuditOutcome;
use restic_protect_core::runtime::Stage;
use restic_protect_core::runtime::StageAuditEvent;
use time::macros::datetime;

use crate::wiring::WiringError;
use crate::wiring::audit_sink;
use crate::wiring::credential_resolver;
use crate::wiring::lock_line;
use crate::wiring::manifest_source;
use crate::wiring::repository_location;

#[test]
fn credential_chain_follows_configured_order() {
    let kinds = [
        CredentialProviderKind::MinioFile,
        CredentialProviderKind::EnvAws,
        CredentialProviderKind::InstanceMetadata,
    ];
    let resolver = credential_resolver(&kinds, &EnvSource::default());
    assert_eq!(resolver.provider_names(), vec!["minio_file", "env_aws", "instance_metadata"]);
}

#[test]
fn default_chain_resolves_from_environment_first() {
    let env = EnvSource::from_pairs([
        ("AWS_ACCESS_KEY_ID", "ak"),
        ("AWS_SECRET_ACCESS_KEY", "sk"),
    ]);
    let resolver = credential_resolver(&CredentialProviderKind::DEFAULT_CHAIN, &env);
    let credential = resolver.resolve().unwrap();
    assert_eq!(credential.provider(), "env_aws");
}

#[test]
fn file_sink_without_path_is_rejected() {
    let config = AuditConfig {
        sink: AuditSinkKind::File,
        path: None,
    };
    assert!(matches!(audit_sink(&config), Err(WiringError::AuditPathRequired)));
}

#[test]
fn file_sink_appends_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let config = AuditConfig {
        sink: AuditSinkKind::File,
        path: Some(path.clone()),
    };
    let sink = audit_sink(&config).unwrap();
    sink.record_stage(&StageAuditEvent::new(Stage::Locate, AuditOutcome::Ok, None, None));
    drop(sink);

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.contains("\"stage_audit\""));
}

#[test]
fn file_sink_open_failure_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("missing").join("audit.jsonl");
    let config = AuditConfig {
        sink: AuditSinkKind::File,
        path: Some(path.clone()),
    };
    let Err(err) = audit_sink(&config) else {
        panic!("expected open failure");
    };
    assert!(err.to_string().contains(&path.display().to_string()));
}

#[test]
fn engine_handle_uses_engine_section() {
    let mut config = ProtectConfig::default();
    config.engine.command = Some("/usr/local/bin/restic".to_string());
    config.engine.dry_run_target = "/tmp/scratch".to_string();

    let engine = manifest_source(&config);

    assert_eq!(engine.command(), "/usr/local/bin/restic");
    assert_eq!(engine.args(), vec![
        "--json",
        "--quiet",
        "restore",
        "--dry-run",
        "--target",
        "/tmp/scratch",
        "latest"
    ]);
}

#[test]
fn unset_location_is_a_locate_failure() {
    let err = repository_location(&ProtectConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedLocation);
    assert!(err.to_string().starts_with("locate: "));
}

#[test]
fn location_carries_effective_region() {
    let mut config = ProtectConfig::default();
    config.repository.location = Some("s3:minio.local:9000/backups/host".to_string());
    config.repository.region = Some("eu-central-1".to_string());

    let location = repository_location(&config).unwrap();

    assert_eq!(location.bucket(), "backups");
    assert_eq!(location.region(), "eu-central-1");
}

#[test]
fn lock_line_shows_confirmed_record() {
    let requested = RetentionRecord {
        mode: RetentionMode::Governance,
        retain_until: datetime!(2026-03-02 01:00:00 UTC),
    };
    let confirmed = RetentionRecord {
        mode: RetentionMode::Governance,
        retain_until: datetime!(2026-03-02 02:00:00 UTC),
    };
    let receipt = LockReceipt {
        key: StorageKey::new("repo/config"),
        requested,
        confirmed,
    };

    assert_eq!(lock_line(&receipt), "repo/config GOVERNANCE 2026-03-02T02:00:00Z");
}
