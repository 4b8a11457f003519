// crates/restic-protect-core/src/core/credentials.rs
// ============================================================================
// Module: Credentials
// Description: Resolved object-store credential material.
// Purpose: Carry access keys from the resolver chain to the store gateway.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`Credential`] is produced by the first provider in the resolver chain
//! that succeeds. It is held only as long as the gateway that consumes it.
//! Secrets are never rendered by `Debug`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SECTION: Credential
// ============================================================================

/// Static access-key credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Access key identifier.
    access_key_id: String,
    /// Secret access key.
    secret_access_key: String,
    /// Optional session token for temporary credentials.
    session_token: Option<String>,
    /// Label of the provider that produced the credential.
    provider: &'static str,
}

impl Credential {
    /// Creates a credential.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        provider: &'static str,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.filter(|token| !token.is_empty()),
            provider,
        }
    }

    /// Access key identifier.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Session token, when the credential is temporary.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Label of the provider that produced this credential.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider)
            .finish()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
