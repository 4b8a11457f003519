//! Section validation and precedence tests for restic-protect-config.
// crates/restic-protect-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Section rules, CLI overrides, and environment fallbacks.
// Purpose: Ensure effective values follow flag, file, environment precedence.
// =============================================================================

use std::path::PathBuf;

use restic_protect_config::AuditSinkKind;
use restic_protect_config::ConfigError;
use restic_protect_config::ConfigOverrides;
use restic_protect_config::CredentialProviderKind;
use restic_protect_config::ProtectConfig;
use restic_protect_config::config_toml_example;
use restic_protect_core::EnvSource;

/// Result type for fallible tests.
type TestResult = Result<(), String>;

/// Parses TOML text through the strict loader.
fn parse(text: &str) -> Result<ProtectConfig, ConfigError> {
    ProtectConfig::from_toml_bytes(text.as_bytes())
}

/// Asserts that parsing failed with a message containing `needle`.
fn assert_invalid(result: Result<ProtectConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

#[test]
fn example_config_is_valid() -> TestResult {
    let config = parse(&config_toml_example()).map_err(|err| err.to_string())?;
    let location = config.repository_location().map_err(|err| err.to_string())?;
    if location.bucket() != "backups" || location.prefix() != "host-a" {
        return Err("example location parsed unexpectedly".to_string());
    }
    if config.audit.sink != AuditSinkKind::File {
        return Err("example should use the file sink".to_string());
    }
    Ok(())
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let config = parse("").map_err(|err| err.to_string())?;
    if config.credentials.providers != CredentialProviderKind::DEFAULT_CHAIN.to_vec() {
        return Err("default chain mismatch".to_string());
    }
    if config.engine_command() != "restic" || config.region() != "us-east-1" {
        return Err("default engine or region mismatch".to_string());
    }
    if config.engine.dry_run_target != "~/doesnotmatter" {
        return Err("default dry-run target mismatch".to_string());
    }
    Ok(())
}

#[test]
fn malformed_location_is_rejected() -> TestResult {
    assert_invalid(parse("[repository]\nlocation = \"sftp:host:/repo\"\n"), "repository.location")
}

#[test]
fn invalid_region_is_rejected() -> TestResult {
    assert_invalid(parse("[repository]\nregion = \"us east\"\n"), "repository.region")
}

#[test]
fn empty_provider_chain_is_rejected() -> TestResult {
    assert_invalid(parse("[credentials]\nproviders = []\n"), "must not be empty")
}

#[test]
fn duplicate_provider_is_rejected() -> TestResult {
    assert_invalid(
        parse("[credentials]\nproviders = [\"env_aws\", \"aws_file\", \"env_aws\"]\n"),
        "env_aws more than once",
    )
}

#[test]
fn unknown_provider_is_rejected() -> TestResult {
    assert_invalid(parse("[credentials]\nproviders = [\"vault\"]\n"), "config parse error")
}

#[test]
fn file_sink_requires_path() -> TestResult {
    assert_invalid(parse("[audit]\nsink = \"file\"\n"), "audit.path is required")
}

#[test]
fn path_without_file_sink_is_rejected() -> TestResult {
    assert_invalid(parse("[audit]\nsink = \"none\"\npath = \"a.jsonl\"\n"), "only valid")
}

#[test]
fn zero_manifest_limit_is_rejected() -> TestResult {
    assert_invalid(parse("[engine]\nmax_manifest_bytes = 0\n"), "engine.max_manifest_bytes")
}

#[test]
fn blank_engine_command_is_rejected() -> TestResult {
    assert_invalid(parse("[engine]\ncommand = \"  \"\n"), "engine.command must be non-empty")
}

#[test]
fn overrides_beat_file_and_file_beats_env() -> TestResult {
    let mut config = parse(
        "[repository]\nlocation = \"s3:file-host/file-bucket\"\nregion = \"eu-west-1\"\n",
    )
    .map_err(|err| err.to_string())?;
    config.apply_overrides(ConfigOverrides {
        repository: Some("s3:cli-host/cli-bucket/sub".to_string()),
        ..ConfigOverrides::default()
    });
    config.apply_env(&EnvSource::from_pairs([
        ("RESTIC_REPOSITORY", "s3:env-host/env-bucket"),
        ("AWS_REGION", "ap-south-1"),
        ("RPS_RESTIC_COMMAND", "/opt/restic"),
    ]));
    config.validate().map_err(|err| err.to_string())?;

    let location = config.repository_location().map_err(|err| err.to_string())?;
    if location.endpoint() != "cli-host" || location.prefix() != "sub" {
        return Err("cli override should win for location".to_string());
    }
    if location.region() != "eu-west-1" {
        return Err("file region should beat environment".to_string());
    }
    if config.engine_command() != "/opt/restic" {
        return Err("environment should fill unset engine command".to_string());
    }
    Ok(())
}

#[test]
fn env_fills_location_and_default_region_alias() -> TestResult {
    let mut config = ProtectConfig::default();
    config.apply_env(&EnvSource::from_pairs([
        ("RESTIC_REPOSITORY", "s3:http://127.0.0.1:9000/restic"),
        ("AWS_DEFAULT_REGION", "us-west-2"),
    ]));
    let location = config.repository_location().map_err(|err| err.to_string())?;
    if !location.use_insecure_transport() || location.region() != "us-west-2" {
        return Err("env location or region not applied".to_string());
    }
    Ok(())
}

#[test]
fn missing_location_is_reported_as_empty() -> TestResult {
    match ProtectConfig::default().repository_location() {
        Err(err) if err.to_string().contains("location is empty") => Ok(()),
        Err(err) => Err(format!("unexpected error {err}")),
        Ok(_) => Err("expected missing location error".to_string()),
    }
}

#[test]
fn audit_overrides_switch_to_file_sink() -> TestResult {
    let mut config = ProtectConfig::default();
    config.apply_overrides(ConfigOverrides {
        audit_sink: Some(AuditSinkKind::File),
        audit_path: Some(PathBuf::from("run.jsonl")),
        ..ConfigOverrides::default()
    });
    config.validate().map_err(|err| err.to_string())?;
    if config.audit.sink != AuditSinkKind::File {
        return Err("audit sink override not applied".to_string());
    }
    Ok(())
}

#[test]
fn non_file_sink_override_drops_file_audit_path() -> TestResult {
    let mut config = parse(
        "[audit]\nsink = \"file\"\npath = \"/var/log/restic-protect.jsonl\"\n",
    )
    .map_err(|err| err.to_string())?;
    config.apply_overrides(ConfigOverrides {
        audit_sink: Some(AuditSinkKind::Stderr),
        ..ConfigOverrides::default()
    });
    config.validate().map_err(|err| err.to_string())?;
    if config.audit.sink != AuditSinkKind::Stderr || config.audit.path.is_some() {
        return Err("stderr override kept the file audit path".to_string());
    }
    Ok(())
}

#[test]
fn explicit_path_with_non_file_sink_is_still_rejected() -> TestResult {
    let mut config = ProtectConfig::default();
    config.apply_overrides(ConfigOverrides {
        audit_sink: Some(AuditSinkKind::Stderr),
        audit_path: Some(PathBuf::from("run.jsonl")),
        ..ConfigOverrides::default()
    });
    match config.validate() {
        Err(_) => Ok(()),
        Ok(()) => Err("expected path without file sink to be rejected".to_string()),
    }
}
