// crates/restic-protect-core/src/runtime/engine.rs
// ============================================================================
// Module: Restic Dry-Run Extractor
// Description: Runs the backup engine's dry-run restore of the latest snapshot.
// Purpose: Produce the snapshot manifest without reading repository internals.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The engine is invoked as
//! `<command> --json --quiet restore --dry-run --target <target> latest`.
//! The child inherits the full process environment, so repository location and
//! password settings reach it unchanged. The target directory is passed
//! literally and never written by a dry run.
//!
//! Output is bounded by `max_manifest_bytes`; oversize output is rejected as
//! a parse failure rather than buffered further. Stderr is drained on its own
//! thread while stdout is read, so a noisy engine never stalls on a full pipe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Read;
use std::process::ChildStderr;
use std::process::Command;
use std::process::Stdio;
use std::thread;

use crate::core::ManifestError;
use crate::core::SnapshotManifest;
use crate::interfaces::ExtractError;
use crate::interfaces::ManifestSource;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable naming the engine executable.
pub const ENGINE_COMMAND_ENV: &str = "RPS_RESTIC_COMMAND";
/// Default engine executable.
pub const DEFAULT_ENGINE_COMMAND: &str = "restic";
/// Default dry-run restore target.
pub const DEFAULT_DRY_RUN_TARGET: &str = "~/doesnotmatter";
/// Default stdout limit in bytes.
pub const DEFAULT_MAX_MANIFEST_BYTES: u64 = 64 * 1024 * 1024;
/// Maximum stderr bytes quoted in failure reasons.
const STDERR_EXCERPT_BYTES: usize = 512;
/// Stderr bytes retained before the excerpt is trimmed; the rest is drained.
const STDERR_CAPTURE_BYTES: u64 = 4096;

// ============================================================================
// SECTION: Extractor
// ============================================================================

/// Manifest source backed by a `restic` dry-run restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResticDryRun {
    /// Engine executable.
    command: String,
    /// Restore target passed to the engine.
    target: String,
    /// Stdout limit in bytes.
    max_manifest_bytes: u64,
}

impl Default for ResticDryRun {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_COMMAND)
    }
}

impl ResticDryRun {
    /// Creates an extractor for the given executable.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            target: DEFAULT_DRY_RUN_TARGET.to_string(),
            max_manifest_bytes: DEFAULT_MAX_MANIFEST_BYTES,
        }
    }

    /// Overrides the dry-run restore target.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Overrides the stdout limit.
    #[must_use]
    pub const fn with_max_manifest_bytes(mut self, max_manifest_bytes: u64) -> Self {
        self.max_manifest_bytes = max_manifest_bytes;
        self
    }

    /// Returns the engine executable.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the engine arguments.
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        vec!["--json", "--quiet", "restore", "--dry-run", "--target", &self.target, "latest"]
    }

    /// Builds an invocation failure for this command.
    fn invocation_failed(&self, reason: impl Into<String>) -> ExtractError {
        ExtractError::EngineInvocationFailed {
            command: self.command.clone(),
            reason: reason.into(),
        }
    }
}

impl ManifestSource for ResticDryRun {
    fn latest_manifest(&self) -> Result<SnapshotManifest, ExtractError> {
        let mut child = Command::new(&self.command)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.invocation_failed(format!("spawn failed: {err}")))?;

        let stderr_reader = child.stderr.take().map(spawn_stderr_drain);

        let mut stdout = Vec::new();
        let mut oversize = false;
        if let Some(pipe) = child.stdout.take() {
            let mut limited = pipe.take(self.max_manifest_bytes.saturating_add(1));
            if let Err(err) = limited.read_to_end(&mut stdout) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.invocation_failed(format!("stdout read failed: {err}")));
            }
            oversize =
                u64::try_from(stdout.len()).map_or(true, |len| len > self.max_manifest_bytes);
            if oversize {
                // Unread output would block the child on a full pipe.
                let _ = child.kill();
            }
        }

        let status =
            child.wait().map_err(|err| self.invocation_failed(format!("wait failed: {err}")))?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if oversize {
            return Err(ExtractError::ManifestParse(ManifestError::Parse(format!(
                "engine output exceeds {} bytes",
                self.max_manifest_bytes
            ))));
        }
        if !status.success() {
            let excerpt = stderr_excerpt(&stderr);
            let reason = if excerpt.is_empty() {
                format!("exited with {status}")
            } else {
                format!("exited with {status}: {excerpt}")
            };
            return Err(self.invocation_failed(reason));
        }
        Ok(SnapshotManifest::from_engine_output(&stdout)?)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the head of engine stderr on a worker thread and discards the rest.
fn spawn_stderr_drain(pipe: ChildStderr) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut head = Vec::new();
        let mut limited = pipe.take(STDERR_CAPTURE_BYTES);
        let _ = limited.read_to_end(&mut head);
        let _ = io::copy(&mut limited.into_inner(), &mut io::sink());
        head
    })
}

/// Returns a trimmed, bounded, lossy excerpt of engine stderr.
fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let mut end = text.len().min(STDERR_EXCERPT_BYTES);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[.. end].to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn args_match_dry_run_invocation() {
        let engine = ResticDryRun::new("restic");
        assert_eq!(engine.args(), [
            "--json",
            "--quiet",
            "restore",
            "--dry-run",
            "--target",
            "~/doesnotmatter",
            "latest"
        ]);
    }

    #[test]
    fn stderr_excerpt_is_bounded_on_char_boundary() {
        let long = "é".repeat(STDERR_EXCERPT_BYTES);
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.len() <= STDERR_EXCERPT_BYTES);
        assert!(excerpt.chars().all(|ch| ch == 'é'));
    }

    #[test]
    fn missing_executable_is_invocation_failure() {
        let engine = ResticDryRun::new("/nonexistent/restic-protect-test-engine");
        let err = engine.latest_manifest().unwrap_err();
        assert!(matches!(err, ExtractError::EngineInvocationFailed { .. }));
    }
}
