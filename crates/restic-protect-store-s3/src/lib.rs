// crates/restic-protect-store-s3/src/lib.rs
// ============================================================================
// Module: restic-protect S3 Store
// Description: S3-compatible object-store gateway and SDK credential links.
// Purpose: Implement the core gateway over aws-sdk-s3 with blocking calls.
// Dependencies: restic-protect-core, aws-config, aws-sdk-s3, tokio
// ============================================================================

//! ## Overview
//! [`S3Gateway`] implements the core object-store gateway against any
//! S3-compatible endpoint using path-style addressing. Every SDK future is
//! driven to completion on a private current-thread runtime, so callers see a
//! plain synchronous API.
//!
//! The SDK-backed links of the credential chain live here as well:
//! [`AwsProfileFileProvider`] reads the AWS shared credentials file and
//! [`InstanceMetadataProvider`], the last link of the default chain, asks
//! the EC2 instance metadata service.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod blocking;
pub mod convert;
pub mod gateway;
pub mod imds;
pub mod profile;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use gateway::S3Gateway;
pub use imds::InstanceMetadataProvider;
pub use profile::AwsProfileFileProvider;
