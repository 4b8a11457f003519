// crates/restic-protect-cli/src/main.rs
// ============================================================================
// Module: restic-protect CLI Entry Point
// Description: Flag parsing and dispatch for the snapshot lock workflow.
// Purpose: Lock (or plan) every object the latest snapshot depends on.
// Dependencies: clap, restic-protect-config, restic-protect-core, restic-protect-store-s3, thiserror, time
// ============================================================================

//! ## Overview
//! Loads configuration, applies flag overrides and environment fallbacks,
//! then wires the credential chain, object-store gateway, engine handle, and
//! audit sink into one workflow run. Confirmed locks go to stdout one per
//! line; diagnostics go to stderr and exit non-zero.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Parser;
use clap::ValueEnum;
use restic_protect_cli::t;
use restic_protect_cli::wiring::audit_sink;
use restic_protect_cli::wiring::credential_resolver;
use restic_protect_cli::wiring::lock_line;
use restic_protect_cli::wiring::manifest_source;
use restic_protect_cli::wiring::repository_location;
use restic_protect_config::AuditSinkKind;
use restic_protect_config::ConfigOverrides;
use restic_protect_config::ProtectConfig;
use restic_protect_config::config_toml_example;
use restic_protect_core::EnvSource;
use restic_protect_core::GatewayError;
use restic_protect_core::ManifestSource;
use restic_protect_core::ObjectStoreGateway;
use restic_protect_core::ProtectAuditSink;
use restic_protect_core::ProtectError;
use restic_protect_core::ProtectWorkflow;
use restic_protect_core::RepositoryLocation;
use restic_protect_core::runtime::record_stage_failure;
use restic_protect_store_s3::S3Gateway;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "restic-protect", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue)]
    show_version: bool,
    /// Print an example configuration file and exit.
    #[arg(long = "print-config", action = ArgAction::SetTrue)]
    print_config: bool,
    /// Config file path (defaults to restic-protect.toml or `RPS_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Repository location (overrides config and `RESTIC_REPOSITORY`).
    #[arg(long, value_name = "LOCATION")]
    repository: Option<String>,
    /// Backup engine executable (overrides config and `RPS_RESTIC_COMMAND`).
    #[arg(long = "restic-command", value_name = "CMD")]
    restic_command: Option<String>,
    /// Signing region (overrides config and `AWS_REGION`).
    #[arg(long, value_name = "REGION")]
    region: Option<String>,
    /// List the keys that would be locked without locking anything.
    #[arg(long, action = ArgAction::SetTrue)]
    plan: bool,
    /// Audit event sink.
    #[arg(long, value_enum, value_name = "SINK")]
    audit: Option<AuditArg>,
    /// Audit log path for the file sink.
    #[arg(long = "audit-path", value_name = "PATH")]
    audit_path: Option<PathBuf>,
}

impl Cli {
    /// Collects flag values that override config file settings.
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            repository: self.repository.clone(),
            region: self.region.clone(),
            restic_command: self.restic_command.clone(),
            audit_sink: self.audit.map(AuditSinkKind::from),
            audit_path: self.audit_path.clone(),
        }
    }
}

/// Audit sink flag values.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum AuditArg {
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to `--audit-path`.
    File,
    /// Discard audit events.
    None,
}

impl From<AuditArg> for AuditSinkKind {
    fn from(value: AuditArg) -> Self {
        match value {
            AuditArg::Stderr => Self::Stderr,
            AuditArg::File => Self::File,
            AuditArg::None => Self::None,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog-rendered error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a rendered message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses flags and dispatches.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    if cli.print_config {
        write_stdout_line(config_toml_example().trim_end())
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = ProtectConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
    config.apply_overrides(cli.overrides());
    let env = EnvSource::Process;
    config.apply_env(&env);

    let audit = audit_sink(&config.audit)
        .map_err(|err| CliError::new(t!("audit.init_failed", error = err)))?;
    let audit = audit.as_ref();

    let location = repository_location(&config).map_err(|err| stage_failure(audit, &err))?;
    config.validate().map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;

    let credential = credential_resolver(&config.credentials.providers, &env)
        .resolve()
        .map_err(|err| stage_failure(audit, &ProtectError::from(err)))?;
    let gateway =
        S3Gateway::connect(&location, &credential).map_err(|err| connect_failure(audit, err))?;
    let engine = manifest_source(&config);
    let workflow = ProtectWorkflow::new(&gateway, &engine, audit);

    if cli.plan { command_plan(&workflow, &location) } else { command_lock(&workflow, &location) }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Locks every dependency of the latest snapshot and prints each confirmation.
fn command_lock<G, M>(
    workflow: &ProtectWorkflow<'_, G, M>,
    location: &RepositoryLocation,
) -> CliResult<ExitCode>
where
    G: ObjectStoreGateway + ?Sized,
    M: ManifestSource + ?Sized,
{
    let mut write_failure = None;
    let result = workflow.run(location, OffsetDateTime::now_utc(), |receipt| {
        if write_failure.is_none()
            && let Err(err) = write_stdout_line(&lock_line(receipt))
        {
            write_failure = Some(err);
        }
    });
    if let Err(err) = result {
        return Err(CliError::new(abort_message(&err)));
    }
    if let Some(err) = write_failure {
        return Err(CliError::new(output_error("stdout", &err)));
    }
    Ok(ExitCode::SUCCESS)
}

/// Prints the keys a lock run would touch.
fn command_plan<G, M>(
    workflow: &ProtectWorkflow<'_, G, M>,
    location: &RepositoryLocation,
) -> CliResult<ExitCode>
where
    G: ObjectStoreGateway + ?Sized,
    M: ManifestSource + ?Sized,
{
    let keys = workflow.plan(location).map_err(|err| CliError::new(abort_message(&err)))?;
    for key in &keys {
        write_stdout_line(&t!("run.plan.entry", key = key))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// Records a failure raised before the workflow starts.
fn stage_failure(audit: &dyn ProtectAuditSink, err: &ProtectError) -> CliError {
    record_stage_failure(audit, err);
    CliError::new(abort_message(err))
}

/// Records a gateway construction failure and renders its diagnostic.
fn connect_failure(audit: &dyn ProtectAuditSink, err: GatewayError) -> CliError {
    let err = ProtectError::ObjectLockCheck(err);
    record_stage_failure(audit, &err);
    CliError::new(connect_failure_message(&err))
}

/// Renders the diagnostic for a gateway that could not be built.
fn connect_failure_message(err: &ProtectError) -> String {
    t!("gateway.connect_failed", error = err)
}

/// Renders the abort diagnostic, with lock counts when locking was cut short.
fn abort_message(err: &ProtectError) -> String {
    let mut message = t!("run.failed", error = err);
    if let Some(apply) = err.apply_error() {
        message.push('\n');
        message.push_str(&t!(
            "run.partial",
            locked = apply.locked.len(),
            unlocked = apply.unlocked_count()
        ));
    }
    message
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
