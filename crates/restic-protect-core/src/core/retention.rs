// crates/restic-protect-core/src/core/retention.rs
// ============================================================================
// Module: Retention Model
// Description: Object-lock retention records, policy, and lock receipts.
// Purpose: Define the durable lock state written to and read from the store.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A retention record pairs an object-lock mode with a retain-until timestamp.
//! The policy used by this tool is fixed: governance mode, a 25-hour window,
//! and no governance bypass. Governance mode lets an administrator holding
//! bypass rights lift the lock; the backup writer's own credential cannot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::keys::StorageKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed retention window applied to every locked key.
pub const RETENTION_WINDOW: Duration = Duration::hours(25);

// ============================================================================
// SECTION: Retention Mode
// ============================================================================

/// Object-lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetentionMode {
    /// Lock can be lifted by callers holding bypass permission.
    Governance,
    /// Lock cannot be lifted by anyone until it expires.
    Compliance,
}

impl RetentionMode {
    /// Returns the wire label used by S3-compatible stores.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Governance => "GOVERNANCE",
            Self::Compliance => "COMPLIANCE",
        }
    }

    /// Parses a wire label (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GOVERNANCE" => Some(Self::Governance),
            "COMPLIANCE" => Some(Self::Compliance),
            _ => None,
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Retention Record
// ============================================================================

/// Per-object retention record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionRecord {
    /// Lock mode.
    pub mode: RetentionMode,
    /// Instant until which the object is retained (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub retain_until: OffsetDateTime,
}

impl RetentionRecord {
    /// Renders `retain_until` as RFC 3339.
    #[must_use]
    pub fn retain_until_rfc3339(&self) -> String {
        self.retain_until
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.retain_until.unix_timestamp().to_string())
    }

    /// Returns true when `self` honors `requested`: same mode and a retain-until
    /// at or after the requested instant.
    #[must_use]
    pub fn satisfies(&self, requested: &Self) -> bool {
        self.mode == requested.mode && self.retain_until >= requested.retain_until
    }
}

// ============================================================================
// SECTION: Retention Policy
// ============================================================================

/// Retention policy applied by the workflow.
///
/// # Invariants
/// - The default is governance mode, a 25-hour window, and no bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Lock mode to request.
    pub mode: RetentionMode,
    /// Window added to the current time.
    pub window: Duration,
    /// Whether to request governance bypass on writes.
    pub governance_bypass: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            mode: RetentionMode::Governance,
            window: RETENTION_WINDOW,
            governance_bypass: false,
        }
    }
}

impl RetentionPolicy {
    /// Builds the record to request for a run starting at `now`.
    ///
    /// The retain-until instant is truncated to whole seconds so store-side
    /// second rounding can never land below the requested value.
    #[must_use]
    pub fn requested_record(&self, now: OffsetDateTime) -> RetentionRecord {
        let until = now.to_offset(time::UtcOffset::UTC) + self.window;
        let until = until.replace_nanosecond(0).unwrap_or(until);
        RetentionRecord {
            mode: self.mode,
            retain_until: until,
        }
    }
}

// ============================================================================
// SECTION: Lock Receipts
// ============================================================================

/// Confirmation that a key was locked and read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockReceipt {
    /// Locked key.
    pub key: StorageKey,
    /// Record submitted to the store.
    pub requested: RetentionRecord,
    /// Record read back from the store.
    pub confirmed: RetentionRecord,
}

/// Ordered receipts for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockReport {
    /// Receipts in lock order.
    pub receipts: Vec<LockReceipt>,
}

impl LockReport {
    /// Number of keys locked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    /// Whether nothing was locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
