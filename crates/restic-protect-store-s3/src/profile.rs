// crates/restic-protect-store-s3/src/profile.rs
// ============================================================================
// Module: Shared Profile Credentials
// Description: Credential provider backed by the AWS shared credentials file.
// Purpose: Resolve the `aws_file` link of the chain through the SDK loader.
// Dependencies: aws-config, aws-credential-types, aws-runtime, aws-sdk-s3,
//               restic-protect-core, tokio
// ============================================================================

//! ## Overview
//! Delegates to the SDK's profile-file provider, which honors
//! `AWS_SHARED_CREDENTIALS_FILE`, `AWS_CONFIG_FILE`, and `AWS_PROFILE` and
//! expands `~` the same way the AWS CLI does. An explicit file or profile
//! pins the lookup instead of the process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use aws_runtime::env_config::file::EnvConfigFileKind;
use aws_runtime::env_config::file::EnvConfigFiles;
use aws_sdk_s3::error::DisplayErrorContext;
use restic_protect_core::Credential;
use restic_protect_core::CredentialError;
use restic_protect_core::CredentialProvider;

use crate::blocking::block_on_with_runtime;
use crate::blocking::build_runtime;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Credentials from the AWS shared credentials file.
#[derive(Debug, Clone, Default)]
pub struct AwsProfileFileProvider {
    /// Credentials file replacing the SDK's default file set.
    path: Option<PathBuf>,
    /// Profile replacing `AWS_PROFILE`.
    profile: Option<String>,
}

impl AwsProfileFileProvider {
    /// Provider label.
    pub const NAME: &'static str = "aws_file";

    /// Creates the provider over the SDK's default file locations.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            path: None,
            profile: None,
        }
    }

    /// Pins the credentials file path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Pins the profile name.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Builds the SDK provider for the pinned file and profile.
    fn sdk_provider(&self) -> ProfileFileCredentialsProvider {
        let mut builder = ProfileFileCredentialsProvider::builder();
        if let Some(path) = &self.path {
            let files =
                EnvConfigFiles::builder().with_file(EnvConfigFileKind::Credentials, path).build();
            builder = builder.profile_files(files);
        }
        if let Some(profile) = &self.profile {
            builder = builder.profile_name(profile);
        }
        builder.build()
    }
}

impl CredentialProvider for AwsProfileFileProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resolve(&self) -> Result<Credential, CredentialError> {
        let runtime =
            build_runtime().map_err(|reason| CredentialError::unavailable(Self::NAME, reason))?;
        let this = self.clone();
        let resolved = block_on_with_runtime(&runtime, async move {
            let provider = this.sdk_provider();
            provider
                .provide_credentials()
                .await
                .map_err(|err| DisplayErrorContext(&err).to_string())
        })
        .map_err(|reason| CredentialError::unavailable(Self::NAME, reason))?
        .map_err(|reason| CredentialError::unavailable(Self::NAME, reason))?;
        Ok(Credential::new(
            resolved.access_key_id(),
            resolved.secret_access_key(),
            resolved.session_token().map(str::to_string),
            Self::NAME,
        ))
    }
}
