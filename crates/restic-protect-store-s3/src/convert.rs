// crates/restic-protect-store-s3/src/convert.rs
// ============================================================================
// Module: S3 Conversions
// Description: Timestamp, retention-mode, and error mapping for the SDK.
// Purpose: Keep SDK types at the edge of the gateway.
// Dependencies: aws-sdk-s3, restic-protect-core, time
// ============================================================================

//! ## Overview
//! Pure helpers translating between SDK values and core types. Service errors
//! are classified by S3 error code first and HTTP status second:
//! - `AccessDenied`, `Forbidden`, or HTTP 403 become access-denied
//! - `ObjectLockConfigurationNotFoundError` becomes object-lock-unavailable
//! - everything else is reported as a store failure with the full error chain

// ============================================================================
// SECTION: Imports
// ============================================================================

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::DateTime;
use aws_sdk_s3::types::ObjectLockRetentionMode;
use restic_protect_core::GatewayError;
use restic_protect_core::RetentionMode;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Error code returned when a bucket has no object-lock configuration.
pub const OBJECT_LOCK_NOT_FOUND_CODE: &str = "ObjectLockConfigurationNotFoundError";
/// Error codes treated as authorization failures.
const ACCESS_DENIED_CODES: [&str; 3] = ["AccessDenied", "Forbidden", "AllAccessDisabled"];
/// HTTP status treated as an authorization failure.
const HTTP_FORBIDDEN: u16 = 403;

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Converts a core timestamp into an SDK timestamp.
#[must_use]
pub fn to_sdk_datetime(value: OffsetDateTime) -> DateTime {
    DateTime::from_secs_and_nanos(value.unix_timestamp(), value.nanosecond())
}

/// Converts an SDK timestamp into a UTC core timestamp.
///
/// # Errors
///
/// Returns a message when the instant is outside the representable range.
pub fn from_sdk_datetime(value: &DateTime) -> Result<OffsetDateTime, String> {
    let nanos = i128::from(value.secs()) * 1_000_000_000 + i128::from(value.subsec_nanos());
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Retention Modes
// ============================================================================

/// Converts a core retention mode into the SDK enum.
#[must_use]
pub const fn to_sdk_mode(mode: RetentionMode) -> ObjectLockRetentionMode {
    match mode {
        RetentionMode::Governance => ObjectLockRetentionMode::Governance,
        RetentionMode::Compliance => ObjectLockRetentionMode::Compliance,
    }
}

/// Converts an SDK retention mode into the core enum.
#[must_use]
pub fn from_sdk_mode(mode: &ObjectLockRetentionMode) -> Option<RetentionMode> {
    RetentionMode::parse(mode.as_str())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error fields relevant to classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    /// S3 error code.
    pub code: Option<String>,
    /// S3 error message.
    pub message: Option<String>,
    /// HTTP status code of the raw response.
    pub status: Option<u16>,
    /// Full rendered error chain.
    pub rendered: String,
}

impl ErrorDetails {
    /// Extracts classification fields from an SDK error.
    #[must_use]
    pub fn from_sdk<E>(err: &SdkError<E, HttpResponse>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let status = err.raw_response().map(|response| response.status().as_u16());
        let (code, message) = match err {
            SdkError::ServiceError(context) => (
                context.err().code().map(str::to_string),
                context.err().message().map(str::to_string),
            ),
            _ => (None, None),
        };
        Self {
            code,
            message,
            status,
            rendered: DisplayErrorContext(err).to_string(),
        }
    }

    /// Returns true when the store reported an authorization failure.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        self.code.as_deref().is_some_and(|code| ACCESS_DENIED_CODES.contains(&code))
            || self.status == Some(HTTP_FORBIDDEN)
    }

    /// Returns true when the bucket has no object-lock configuration.
    #[must_use]
    pub fn is_object_lock_missing(&self) -> bool {
        self.code.as_deref() == Some(OBJECT_LOCK_NOT_FOUND_CODE)
    }

    /// Best human-readable reason.
    #[must_use]
    pub fn reason(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => self.rendered.clone(),
        }
    }
}

/// Maps error details to a gateway error for an operation.
#[must_use]
pub fn classify(operation: &'static str, details: &ErrorDetails) -> GatewayError {
    if details.is_access_denied() {
        return GatewayError::AccessDenied {
            operation,
            message: details.reason(),
        };
    }
    GatewayError::StoreUnavailable {
        operation,
        cause: details.rendered.clone(),
    }
}
