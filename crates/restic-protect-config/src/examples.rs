// crates/restic-protect-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and `--print-config`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for restic-protect configuration. The output parses and
//! validates with [`crate::ProtectConfig::from_toml_bytes`].

/// Returns a canonical example `restic-protect.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[repository]
location = "s3:https://minio.example.com/backups/host-a"
region = "us-east-1"

[engine]
command = "restic"
dry_run_target = "~/doesnotmatter"
max_manifest_bytes = 67108864

[credentials]
providers = ["env_aws", "env_minio", "aws_file", "minio_file", "instance_metadata"]

[audit]
sink = "file"
path = "restic-protect-audit.jsonl"
"#,
    )
}
