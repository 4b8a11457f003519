// crates/restic-protect-core/src/core/location.rs
// ============================================================================
// Module: Repository Location
// Description: Parser for restic S3 repository connection strings.
// Purpose: Turn `s3:` locations into structured endpoint/bucket/prefix data.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Repository locations follow the restic S3 backend syntax:
//! `s3:[http://|https://]<endpoint>/<bucket>[/<prefix>]`, plus the legacy
//! `s3://<endpoint>/<bucket>[/<prefix>]` form. Parsing is pure and
//! deterministic; no network access is performed.
//!
//! ## Invariants
//! - `bucket` and `endpoint` are non-empty.
//! - `prefix` never carries a leading or trailing slash and never contains an
//!   empty, `.` or `..` segment.
//! - Rendering a location with [`std::fmt::Display`] and parsing the result
//!   yields the same location.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Region used when neither config nor environment supplies one.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Scheme marker for S3 repository locations.
const S3_SCHEME: &str = "s3:";
/// Legacy scheme marker (`s3://host/bucket`).
const S3_LEGACY_SCHEME: &str = "s3://";
/// Maximum accepted location length in bytes.
const MAX_LOCATION_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Repository location parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The location string is malformed.
    #[error("malformed repository location: {segment} {reason}")]
    Malformed {
        /// Offending segment label (scheme, endpoint, bucket, prefix).
        segment: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

impl LocationError {
    /// Builds a malformed-location error for a segment.
    fn malformed(segment: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            segment,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Repository Location
// ============================================================================

/// Structured S3 repository location.
///
/// # Invariants
/// - Immutable once parsed; only the region may be replaced via
///   [`RepositoryLocation::with_region`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    /// Endpoint host (and optional port).
    endpoint: String,
    /// Bucket name.
    bucket: String,
    /// Key prefix inside the bucket (possibly empty).
    prefix: String,
    /// Region used for request signing.
    region: String,
    /// Whether the endpoint is reached over plain HTTP.
    use_insecure_transport: bool,
}

impl RepositoryLocation {
    /// Parses a repository connection string.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Malformed`] naming the offending segment.
    pub fn parse(raw: &str) -> Result<Self, LocationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LocationError::malformed("scheme", "location is empty"));
        }
        if raw.len() > MAX_LOCATION_LENGTH {
            return Err(LocationError::malformed("scheme", "location exceeds length limit"));
        }
        let (rest, use_insecure_transport) = if let Some(rest) = raw.strip_prefix(S3_LEGACY_SCHEME)
        {
            (rest, false)
        } else if let Some(rest) = raw.strip_prefix(S3_SCHEME) {
            if let Some(rest) = rest.strip_prefix("https://") {
                (rest, false)
            } else if let Some(rest) = rest.strip_prefix("http://") {
                (rest, true)
            } else {
                (rest, false)
            }
        } else {
            return Err(LocationError::malformed("scheme", "must start with s3:"));
        };

        let mut segments = rest.splitn(3, '/');
        let endpoint = segments.next().unwrap_or_default().trim();
        if endpoint.is_empty() {
            return Err(LocationError::malformed("endpoint", "must be set"));
        }
        if endpoint.contains(['\\', '?', '#']) {
            return Err(LocationError::malformed("endpoint", "contains invalid characters"));
        }
        let bucket = segments.next().unwrap_or_default().trim();
        if bucket.is_empty() {
            return Err(LocationError::malformed("bucket", "must be set"));
        }
        if bucket.contains('\\') {
            return Err(LocationError::malformed("bucket", "contains invalid characters"));
        }
        let prefix = normalize_prefix(segments.next().unwrap_or_default())?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            bucket: bucket.to_string(),
            prefix,
            region: DEFAULT_REGION.to_string(),
            use_insecure_transport,
        })
    }

    /// Returns a copy of this location using the given region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        if !region.trim().is_empty() {
            self.region = region.trim().to_string();
        }
        self
    }

    /// Endpoint host (and optional port).
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key prefix inside the bucket; empty when the repository is at the root.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Signing region.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Whether plain HTTP is used.
    #[must_use]
    pub const fn use_insecure_transport(&self) -> bool {
        self.use_insecure_transport
    }

    /// Returns the endpoint as a URL including the transport scheme.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_insecure_transport { "http" } else { "https" };
        format!("{scheme}://{}", self.endpoint)
    }

    /// Returns the listing prefix under which key-material objects live.
    #[must_use]
    pub fn key_material_prefix(&self) -> String {
        if self.prefix.is_empty() { "keys/".to_string() } else { format!("{}/keys/", self.prefix) }
    }
}

impl fmt::Display for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3:{}/{}", self.endpoint_url(), self.bucket)?;
        if !self.prefix.is_empty() {
            write!(f, "/{}", self.prefix)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes the prefix portion of a location.
fn normalize_prefix(raw: &str) -> Result<String, LocationError> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.contains('\\') {
        return Err(LocationError::malformed("prefix", "must not contain backslashes"));
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            return Err(LocationError::malformed("prefix", "contains an empty segment"));
        }
        if segment == "." || segment == ".." {
            return Err(LocationError::malformed("prefix", "must not contain traversal segments"));
        }
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
