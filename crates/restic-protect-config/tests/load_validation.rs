//! Config load validation tests for restic-protect-config.
// crates/restic-protect-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, presence).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use restic_protect_config::ConfigError;
use restic_protect_config::ConfigPath;
use restic_protect_config::DEFAULT_CONFIG_NAME;
use restic_protect_config::ProtectConfig;
use tempfile::NamedTempFile;

/// Result type for fallible tests.
type TestResult = Result<(), String>;

/// Asserts that loading failed with a message containing `needle`.
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
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(ProtectConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(ProtectConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(ProtectConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(ProtectConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_rejects_unknown_fields() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[repository]\nlocation = \"s3:host/bucket\"\nretention_hours = 48\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(ProtectConfig::load(Some(file.path())), "config parse error")?;
    Ok(())
}

#[test]
fn explicit_missing_file_is_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    assert_invalid(ProtectConfig::load(Some(&missing)), "config io error")?;
    Ok(())
}

#[test]
fn missing_default_file_yields_defaults() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let resolved = ConfigPath::Default(dir.path().join(DEFAULT_CONFIG_NAME));
    let config = ProtectConfig::load_resolved(&resolved).map_err(|err| err.to_string())?;
    if config != ProtectConfig::default() {
        return Err("expected default config".to_string());
    }
    Ok(())
}

#[test]
fn resolve_prefers_cli_then_env_then_default() -> TestResult {
    let cli = PathBuf::from("cli.toml");
    let from_cli = ConfigPath::resolve(Some(&cli), Some("env.toml".to_string()))
        .map_err(|err| err.to_string())?;
    if from_cli != ConfigPath::Explicit(cli) {
        return Err("cli path should win".to_string());
    }
    let from_env =
        ConfigPath::resolve(None, Some("env.toml".to_string())).map_err(|err| err.to_string())?;
    if from_env != ConfigPath::Explicit(PathBuf::from("env.toml")) {
        return Err("env path should be explicit".to_string());
    }
    let fallback = ConfigPath::resolve(None, Some("  ".to_string())).map_err(|err| err.to_string())?;
    if fallback != ConfigPath::Default(PathBuf::from(DEFAULT_CONFIG_NAME)) {
        return Err("blank env should fall back to default".to_string());
    }
    Ok(())
}

#[test]
fn resolve_rejects_oversized_env_path() -> TestResult {
    match ConfigPath::resolve(None, Some("a".repeat(5_000))) {
        Err(err) if err.to_string().contains("config path exceeds max length") => Ok(()),
        Err(err) => Err(format!("unexpected error {err}")),
        Ok(_) => Err("expected oversized env path to fail".to_string()),
    }
}
