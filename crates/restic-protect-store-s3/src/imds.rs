// crates/restic-protect-store-s3/src/imds.rs
// ============================================================================
// Module: Instance Metadata Credentials
// Description: Credential provider backed by the EC2 instance metadata service.
// Purpose: Last-resort link of the credential chain on cloud hosts.
// Dependencies: aws-config, aws-credential-types, restic-protect-core, tokio
// ============================================================================

//! ## Overview
//! Resolves the instance role's temporary credentials through IMDS. Off an
//! instance the metadata endpoint is unreachable and the SDK's own connect
//! timeout bounds the attempt before the provider reports unavailable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use restic_protect_core::Credential;
use restic_protect_core::CredentialError;
use restic_protect_core::CredentialProvider;

use crate::blocking::block_on_with_runtime;
use crate::blocking::build_runtime;

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Credentials from the instance metadata service.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceMetadataProvider;

impl InstanceMetadataProvider {
    /// Provider label.
    pub const NAME: &'static str = "instance_metadata";

    /// Creates the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CredentialProvider for InstanceMetadataProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resolve(&self) -> Result<Credential, CredentialError> {
        let runtime =
            build_runtime().map_err(|reason| CredentialError::unavailable(Self::NAME, reason))?;
        let resolved = block_on_with_runtime(&runtime, async {
            let provider = ImdsCredentialsProvider::builder().build();
            provider.provide_credentials().await.map_err(|err| err.to_string())
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
