// crates/restic-protect-core/src/runtime/credential_chain.rs
// ============================================================================
// Module: Credential Chain
// Description: Ordered credential resolver and local credential providers.
// Purpose: Yield the credential of the first provider that succeeds.
// Dependencies: crate::core, crate::interfaces, serde, serde_json
// ============================================================================

//! ## Overview
//! The resolver walks an explicit, ordered list of providers and returns the
//! first credential it gets. Providers run one after another on the calling
//! thread; order is precedence, not a race.
//!
//! Built-in local providers read the process environment or well-known files:
//! - `env_aws`: `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` (+ session token)
//! - `env_minio`: `MINIO_ROOT_USER`/`MINIO_ROOT_PASSWORD` or the legacy
//!   `MINIO_ACCESS_KEY`/`MINIO_SECRET_KEY`
//! - `minio_file`: `mc` client config, alias from `MINIO_ALIAS`
//!
//! The `aws_file` and `instance_metadata` links need the AWS SDK and live in
//! the S3 store crate.
//!
//! Environment access goes through [`EnvSource`] so lookups can be pinned in
//! tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::Credential;
use crate::interfaces::CredentialError;
use crate::interfaces::CredentialProvider;
use crate::interfaces::ProviderAttempt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum credentials file size in bytes.
const MAX_CREDENTIALS_FILE_BYTES: u64 = 1024 * 1024;
/// Default `mc` alias.
const DEFAULT_MINIO_ALIAS: &str = "s3";

// ============================================================================
// SECTION: Environment Source
// ============================================================================

/// Environment lookup used by credential providers.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// Read from the process environment.
    #[default]
    Process,
    /// Read from a fixed map.
    Overrides(BTreeMap<String, String>),
}

impl EnvSource {
    /// Builds an override source from key/value pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Overrides(pairs.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }

    /// Returns a non-empty value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match self {
            Self::Process => std::env::var(key).ok(),
            Self::Overrides(map) => map.get(key).cloned(),
        };
        value.filter(|value| !value.trim().is_empty())
    }

    /// Returns the first non-empty value among `keys`.
    #[must_use]
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Returns the user's home directory.
    #[must_use]
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.first_of(&["HOME", "USERPROFILE"]).map(PathBuf::from)
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Ordered credential provider chain.
///
/// # Invariants
/// - Providers are tried in the order given; the first success wins.
pub struct CredentialResolver {
    /// Providers in precedence order.
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialResolver {
    /// Creates a resolver over an ordered provider list.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self {
            providers,
        }
    }

    /// Returns provider labels in chain order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Resolves the first available credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::NoCredentialAvailable`] listing every
    /// attempt when all providers fail.
    pub fn resolve(&self) -> Result<Credential, CredentialError> {
        let mut attempts = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.resolve() {
                Ok(credential) => return Ok(credential),
                Err(err) => attempts.push(ProviderAttempt {
                    provider: provider.name(),
                    reason: match err {
                        CredentialError::Unavailable {
                            reason, ..
                        } => reason,
                        other => other.to_string(),
                    },
                }),
            }
        }
        Err(CredentialError::NoCredentialAvailable {
            attempts,
        })
    }
}

// ============================================================================
// SECTION: Environment Providers
// ============================================================================

/// Credentials from standard AWS environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvAwsProvider {
    /// Environment lookup.
    env: EnvSource,
}

impl EnvAwsProvider {
    /// Provider label.
    pub const NAME: &'static str = "env_aws";

    /// Creates the provider over an environment source.
    #[must_use]
    pub const fn new(env: EnvSource) -> Self {
        Self {
            env,
        }
    }
}

impl CredentialProvider for EnvAwsProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resolve(&self) -> Result<Credential, CredentialError> {
        let access = self.env.first_of(&["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"]);
        let secret = self.env.first_of(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"]);
        match (access, secret) {
            (Some(access), Some(secret)) => {
                Ok(Credential::new(access, secret, self.env.get("AWS_SESSION_TOKEN"), Self::NAME))
            }
            _ => Err(CredentialError::unavailable(Self::NAME, "access key or secret key not set")),
        }
    }
}

/// Credentials from MinIO environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvMinioProvider {
    /// Environment lookup.
    env: EnvSource,
}

impl EnvMinioProvider {
    /// Provider label.
    pub const NAME: &'static str = "env_minio";

    /// Creates the provider over an environment source.
    #[must_use]
    pub const fn new(env: EnvSource) -> Self {
        Self {
            env,
        }
    }
}

impl CredentialProvider for EnvMinioProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resolve(&self) -> Result<Credential, CredentialError> {
        let root = self.env.get("MINIO_ROOT_USER").zip(self.env.get("MINIO_ROOT_PASSWORD"));
        let legacy = || self.env.get("MINIO_ACCESS_KEY").zip(self.env.get("MINIO_SECRET_KEY"));
        root.or_else(legacy)
            .map(|(access, secret)| Credential::new(access, secret, None, Self::NAME))
            .ok_or_else(|| CredentialError::unavailable(Self::NAME, "minio credentials not set"))
    }
}

// ============================================================================
// SECTION: File Providers
// ============================================================================

/// Credentials from the MinIO client (`mc`) configuration file.
#[derive(Debug, Clone, Default)]
pub struct MinioClientFileProvider {
    /// Environment lookup (alias, home directory).
    env: EnvSource,
    /// Explicit file path overriding `~/.mc/config.json`.
    path: Option<PathBuf>,
}

/// Subset of the `mc` configuration file.
#[derive(Debug, Deserialize)]
struct MinioClientConfig {
    /// Current alias map.
    #[serde(default)]
    aliases: BTreeMap<String, MinioClientAlias>,
    /// Legacy alias map.
    #[serde(default)]
    hosts: BTreeMap<String, MinioClientAlias>,
}

/// A single `mc` alias entry.
#[derive(Debug, Deserialize)]
struct MinioClientAlias {
    /// Access key.
    #[serde(rename = "accessKey", default)]
    access_key: String,
    /// Secret key.
    #[serde(rename = "secretKey", default)]
    secret_key: String,
    /// Optional session token.
    #[serde(rename = "sessionToken", default)]
    session_token: Option<String>,
}

impl MinioClientFileProvider {
    /// Provider label.
    pub const NAME: &'static str = "minio_file";

    /// Creates the provider over an environment source.
    #[must_use]
    pub const fn new(env: EnvSource) -> Self {
        Self {
            env,
            path: None,
        }
    }

    /// Pins the config file path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl CredentialProvider for MinioClientFileProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resolve(&self) -> Result<Credential, CredentialError> {
        let path = self
            .path
            .clone()
            .or_else(|| self.env.home_dir().map(|home| home.join(".mc").join("config.json")))
            .ok_or_else(|| CredentialError::unavailable(Self::NAME, "no mc config path"))?;
        let content = read_limited(Self::NAME, &path)?;
        let config: MinioClientConfig = serde_json::from_str(&content)
            .map_err(|err| CredentialError::unavailable(Self::NAME, err.to_string()))?;
        let alias =
            self.env.get("MINIO_ALIAS").unwrap_or_else(|| DEFAULT_MINIO_ALIAS.to_string());
        let entry = config.aliases.get(&alias).or_else(|| config.hosts.get(&alias)).ok_or_else(
            || CredentialError::unavailable(Self::NAME, format!("alias {alias} not found")),
        )?;
        if entry.access_key.is_empty() || entry.secret_key.is_empty() {
            return Err(CredentialError::unavailable(
                Self::NAME,
                format!("alias {alias} lacks access key or secret key"),
            ));
        }
        Ok(Credential::new(
            entry.access_key.clone(),
            entry.secret_key.clone(),
            entry.session_token.clone(),
            Self::NAME,
        ))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a small text file, failing closed on size or encoding problems.
fn read_limited(provider: &'static str, path: &Path) -> Result<String, CredentialError> {
    let metadata = fs::metadata(path).map_err(|err| {
        CredentialError::unavailable(provider, format!("{}: {err}", path.display()))
    })?;
    if metadata.len() > MAX_CREDENTIALS_FILE_BYTES {
        return Err(CredentialError::unavailable(provider, "credentials file exceeds size limit"));
    }
    let bytes = fs::read(path).map_err(|err| {
        CredentialError::unavailable(provider, format!("{}: {err}", path.display()))
    })?;
    String::from_utf8(bytes)
        .map_err(|_| CredentialError::unavailable(provider, "credentials file must be utf-8"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
