// crates/restic-protect-core/src/runtime/audit.rs
// ============================================================================
// Module: Protect Audit Logging
// Description: Structured audit events for the lock workflow.
// Purpose: Emit JSON-line events per stage, per locked key, and per run.
// Dependencies: crate::core, serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain serializable payloads written as one JSON object per
//! line. Sinks never fail the workflow: serialization or write errors are
//! dropped. Events carry storage keys and retention timestamps only; no
//! credential material is ever recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::LockReceipt;
use crate::core::RetentionMode;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Workflow stage label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Repository location parsing.
    Locate,
    /// Credential resolution.
    Credentials,
    /// Bucket object-lock check.
    ObjectLockCheck,
    /// Manifest extraction from the engine.
    Extract,
    /// Key-material listing.
    ListKeys,
    /// Object set construction.
    BuildObjectSet,
    /// Retention application.
    ApplyRetention,
}

impl Stage {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locate => "locate",
            Self::Credentials => "credentials",
            Self::ObjectLockCheck => "object_lock_check",
            Self::Extract => "extract",
            Self::ListKeys => "list_keys",
            Self::BuildObjectSet => "build_object_set",
            Self::ApplyRetention => "apply_retention",
        }
    }
}

/// Stage or run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Completed.
    Ok,
    /// Failed.
    Error,
}

/// Stage completion event.
#[derive(Debug, Clone, Serialize)]
pub struct StageAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Stage that finished.
    pub stage: Stage,
    /// Stage outcome.
    pub outcome: AuditOutcome,
    /// Normalized error kind label when failed.
    pub error_kind: Option<&'static str>,
    /// Short detail (counts or error message).
    pub detail: Option<String>,
}

impl StageAuditEvent {
    /// Creates a stage event with a consistent timestamp.
    #[must_use]
    pub fn new(
        stage: Stage,
        outcome: AuditOutcome,
        error_kind: Option<&'static str>,
        detail: Option<String>,
    ) -> Self {
        Self {
            event: "stage_audit",
            timestamp_ms: now_ms(),
            stage,
            outcome,
            error_kind,
            detail,
        }
    }
}

/// Per-key retention event.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Locked storage key.
    pub key: String,
    /// Confirmed retention mode.
    pub mode: RetentionMode,
    /// Requested retain-until (RFC 3339).
    pub requested_until: String,
    /// Confirmed retain-until (RFC 3339).
    pub confirmed_until: String,
}

impl RetentionAuditEvent {
    /// Creates a retention event from a receipt.
    #[must_use]
    pub fn from_receipt(receipt: &LockReceipt) -> Self {
        Self {
            event: "retention_audit",
            timestamp_ms: now_ms(),
            key: receipt.key.to_string(),
            mode: receipt.confirmed.mode,
            requested_until: receipt.requested.retain_until_rfc3339(),
            confirmed_until: receipt.confirmed.retain_until_rfc3339(),
        }
    }
}

/// Run summary event.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummaryEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Keys locked and confirmed.
    pub locked: usize,
    /// Keys not locked (failed plus never attempted).
    pub pending: usize,
    /// Run outcome.
    pub outcome: AuditOutcome,
    /// Normalized error kind label when failed.
    pub error_kind: Option<&'static str>,
}

impl RunSummaryEvent {
    /// Creates a summary event with a consistent timestamp.
    #[must_use]
    pub fn new(
        locked: usize,
        pending: usize,
        outcome: AuditOutcome,
        error_kind: Option<&'static str>,
    ) -> Self {
        Self {
            event: "run_summary",
            timestamp_ms: now_ms(),
            locked,
            pending,
            outcome,
            error_kind,
        }
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for workflow events.
pub trait ProtectAuditSink: Send + Sync {
    /// Record a stage event.
    fn record_stage(&self, event: &StageAuditEvent);

    /// Record a per-key retention event.
    fn record_retention(&self, _event: &RetentionAuditEvent) {}

    /// Record a run summary event.
    fn record_summary(&self, _event: &RunSummaryEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event line.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl ProtectAuditSink for StderrAuditSink {
    fn record_stage(&self, event: &StageAuditEvent) {
        Self::emit(event);
    }

    fn record_retention(&self, event: &RetentionAuditEvent) {
        Self::emit(event);
    }

    fn record_summary(&self, event: &RunSummaryEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event line.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl ProtectAuditSink for FileAuditSink {
    fn record_stage(&self, event: &StageAuditEvent) {
        self.emit(event);
    }

    fn record_retention(&self, event: &RetentionAuditEvent) {
        self.emit(event);
    }

    fn record_summary(&self, event: &RunSummaryEvent) {
        self.emit(event);
    }
}

/// Audit sink that drops all events.
pub struct NoopAuditSink;

impl ProtectAuditSink for NoopAuditSink {
    fn record_stage(&self, _event: &StageAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
