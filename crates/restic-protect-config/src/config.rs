// crates/restic-protect-config/src/config.rs
// ============================================================================
// Module: restic-protect Configuration
// Description: Configuration loading, overrides, and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: restic-protect-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The file is resolved from an explicit path, then `RPS_CONFIG`, then
//! `restic-protect.toml` in the working directory. Only the default file may
//! be absent; a named file that cannot be read is an error.
//!
//! Precedence for every effective value is: CLI override, config file,
//! environment, built-in default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use restic_protect_core::DEFAULT_REGION;
use restic_protect_core::EnvSource;
use restic_protect_core::LocationError;
use restic_protect_core::RepositoryLocation;
use restic_protect_core::runtime::DEFAULT_DRY_RUN_TARGET;
use restic_protect_core::runtime::DEFAULT_ENGINE_COMMAND;
use restic_protect_core::runtime::DEFAULT_MAX_MANIFEST_BYTES;
use restic_protect_core::runtime::ENGINE_COMMAND_ENV;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "restic-protect.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "RPS_CONFIG";
/// Environment variable holding the repository location.
pub const REPOSITORY_ENV_VAR: &str = "RESTIC_REPOSITORY";
/// Environment variables consulted for the signing region, in order.
pub const REGION_ENV_VARS: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum region name length.
const MAX_REGION_LENGTH: usize = 64;
/// Upper bound for the engine output limit.
const MAX_MANIFEST_BYTES_LIMIT: u64 = 1024 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config Path
// ============================================================================

/// Resolved configuration file path and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    /// Named on the command line or via `RPS_CONFIG`; must exist.
    Explicit(PathBuf),
    /// Default filename; may be absent.
    Default(PathBuf),
}

impl ConfigPath {
    /// Resolves the config path from a CLI value and an environment value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the environment path is too long.
    pub fn resolve(cli: Option<&Path>, env_value: Option<String>) -> Result<Self, ConfigError> {
        if let Some(path) = cli {
            return Ok(Self::Explicit(path.to_path_buf()));
        }
        if let Some(env_path) = env_value.filter(|value| !value.trim().is_empty()) {
            if env_path.len() > MAX_TOTAL_PATH_LENGTH {
                return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
            }
            return Ok(Self::Explicit(PathBuf::from(env_path)));
        }
        Ok(Self::Default(PathBuf::from(DEFAULT_CONFIG_NAME)))
    }

    /// Returns the path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Default(path) => path,
        }
    }
}

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level restic-protect configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectConfig {
    /// Repository location settings.
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Backup engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Credential chain settings.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// `[repository]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Repository location string (`s3:...`).
    #[serde(default)]
    pub location: Option<String>,
    /// Signing region.
    #[serde(default)]
    pub region: Option<String>,
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Engine executable.
    #[serde(default)]
    pub command: Option<String>,
    /// Dry-run restore target passed to the engine.
    #[serde(default = "default_dry_run_target")]
    pub dry_run_target: String,
    /// Maximum engine stdout size in bytes.
    #[serde(default = "default_max_manifest_bytes")]
    pub max_manifest_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            dry_run_target: default_dry_run_target(),
            max_manifest_bytes: default_max_manifest_bytes(),
        }
    }
}

/// Credential provider identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialProviderKind {
    /// AWS environment variables.
    EnvAws,
    /// MinIO environment variables.
    EnvMinio,
    /// AWS shared credentials file.
    AwsFile,
    /// MinIO client config file.
    MinioFile,
    /// EC2 instance metadata service.
    InstanceMetadata,
}

impl CredentialProviderKind {
    /// Default chain order.
    pub const DEFAULT_CHAIN: [Self; 5] =
        [Self::EnvAws, Self::EnvMinio, Self::AwsFile, Self::MinioFile, Self::InstanceMetadata];

    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnvAws => "env_aws",
            Self::EnvMinio => "env_minio",
            Self::AwsFile => "aws_file",
            Self::MinioFile => "minio_file",
            Self::InstanceMetadata => "instance_metadata",
        }
    }
}

impl fmt::Display for CredentialProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[credentials]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Providers in precedence order.
    #[serde(default = "default_providers")]
    pub providers: Vec<CredentialProviderKind>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
        }
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard events.
    None,
}

/// `[audit]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path (required for `file`).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// `--repository`.
    pub repository: Option<String>,
    /// `--region`.
    pub region: Option<String>,
    /// `--restic-command`.
    pub restic_command: Option<String>,
    /// `--audit`.
    pub audit_sink: Option<AuditSinkKind>,
    /// `--audit-path`.
    pub audit_path: Option<PathBuf>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ProtectConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = ConfigPath::resolve(path, env::var(CONFIG_ENV_VAR).ok())?;
        Self::load_resolved(&resolved)
    }

    /// Loads configuration from an already resolved path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_resolved(resolved: &ConfigPath) -> Result<Self, ConfigError> {
        let path = resolved.path();
        validate_path(path)?;
        if matches!(resolved, ConfigPath::Default(_)) && !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        Self::from_toml_bytes(&bytes)
    }

    /// Parses and validates configuration bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides on top of file values.
    ///
    /// Selecting a sink other than `file` drops an audit path inherited from
    /// the file; an explicit path override is still applied and validated.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(location) = overrides.repository {
            self.repository.location = Some(location);
        }
        if let Some(region) = overrides.region {
            self.repository.region = Some(region);
        }
        if let Some(command) = overrides.restic_command {
            self.engine.command = Some(command);
        }
        if let Some(sink) = overrides.audit_sink {
            // A file path only belongs to the file sink.
            if sink != AuditSinkKind::File {
                self.audit.path = None;
            }
            self.audit.sink = sink;
        }
        if let Some(path) = overrides.audit_path {
            self.audit.path = Some(path);
        }
    }

    /// Fills unset values from the environment.
    pub fn apply_env(&mut self, env: &EnvSource) {
        if self.repository.location.is_none() {
            self.repository.location = env.get(REPOSITORY_ENV_VAR);
        }
        if self.repository.region.is_none() {
            self.repository.region = env.first_of(&REGION_ENV_VARS);
        }
        if self.engine.command.is_none() {
            self.engine.command = env.get(ENGINE_COMMAND_ENV);
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.repository.validate()?;
        self.engine.validate()?;
        self.credentials.validate()?;
        self.audit.validate()
    }

    /// Returns the parsed repository location with the effective region.
    ///
    /// An unset location is reported like an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] when the location is missing or malformed.
    pub fn repository_location(&self) -> Result<RepositoryLocation, LocationError> {
        let raw = self.repository.location.as_deref().unwrap_or_default();
        Ok(RepositoryLocation::parse(raw)?.with_region(self.region()))
    }

    /// Effective signing region.
    #[must_use]
    pub fn region(&self) -> &str {
        self.repository.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Effective engine executable.
    #[must_use]
    pub fn engine_command(&self) -> &str {
        self.engine.command.as_deref().unwrap_or(DEFAULT_ENGINE_COMMAND)
    }
}

// ============================================================================
// SECTION: Section Validation
// ============================================================================

impl RepositoryConfig {
    /// Validates repository settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(location) = &self.location {
            RepositoryLocation::parse(location)
                .map_err(|err| ConfigError::Invalid(format!("repository.location: {err}")))?;
        }
        if let Some(region) = &self.region {
            let valid = !region.is_empty()
                && region.len() <= MAX_REGION_LENGTH
                && region.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
            if !valid {
                return Err(ConfigError::Invalid(
                    "repository.region must be 1-64 alphanumeric or '-' characters".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Validates engine settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(command) = &self.command {
            if command.trim().is_empty() {
                return Err(ConfigError::Invalid("engine.command must be non-empty".to_string()));
            }
            if command.contains('\0') {
                return Err(ConfigError::Invalid(
                    "engine.command must not contain NUL bytes".to_string(),
                ));
            }
            validate_path_string("engine.command", command)?;
        }
        validate_path_string("engine.dry_run_target", &self.dry_run_target)?;
        if self.max_manifest_bytes == 0 || self.max_manifest_bytes > MAX_MANIFEST_BYTES_LIMIT {
            return Err(ConfigError::Invalid(
                "engine.max_manifest_bytes must be between 1 and 1073741824".to_string(),
            ));
        }
        Ok(())
    }
}

impl CredentialsConfig {
    /// Validates the provider chain.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("credentials.providers must not be empty".to_string()));
        }
        let mut seen = BTreeSet::new();
        for provider in &self.providers {
            if !seen.insert(*provider) {
                return Err(ConfigError::Invalid(format!(
                    "credentials.providers lists {provider} more than once"
                )));
            }
        }
        Ok(())
    }
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required when audit.sink = \"file\"".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid when audit.sink = \"file\"".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default dry-run target.
fn default_dry_run_target() -> String {
    DEFAULT_DRY_RUN_TARGET.to_string()
}

/// Default engine output limit.
const fn default_max_manifest_bytes() -> u64 {
    DEFAULT_MAX_MANIFEST_BYTES
}

/// Default provider chain.
fn default_providers() -> Vec<CredentialProviderKind> {
    CredentialProviderKind::DEFAULT_CHAIN.to_vec()
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
