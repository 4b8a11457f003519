// crates/restic-protect-cli/src/lib.rs
// ============================================================================
// Module: restic-protect CLI Library
// Description: Shared helpers for the restic-protect command-line interface.
// Purpose: Provide reusable components (i18n, wiring) for the binary and tests.
// Dependencies: restic-protect-config, restic-protect-core, restic-protect-store-s3
// ============================================================================

//! ## Overview
//! This library houses the message catalog and the glue that turns a loaded
//! configuration into a credential chain, an audit sink, and an engine
//! handle. The binary entry point (`src/main.rs`) only parses flags,
//! dispatches, and writes output.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Internationalization helpers and message catalog.
pub mod i18n;
/// Construction of runtime components from configuration.
pub mod wiring;
