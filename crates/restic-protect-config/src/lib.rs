// crates/restic-protect-config/src/lib.rs
// ============================================================================
// Module: restic-protect Config Library
// Description: Canonical config model, validation, and example payloads.
// Purpose: Single source of truth for restic-protect.toml semantics.
// Dependencies: restic-protect-core, serde, toml
// ============================================================================

//! ## Overview
//! `restic-protect-config` defines the configuration model for the
//! `restic-protect` binary. Loading is strict and fails closed; values left
//! unset fall back to CLI flags, then to the process environment.
//!
//! The retention policy is fixed and has no config surface.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
