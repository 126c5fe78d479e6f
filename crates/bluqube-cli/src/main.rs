// crates/bluqube-cli/src/main.rs
// ============================================================================
// Module: BluQube CLI Entry Point
// Description: Serve the todo sample over HTTP or dispatch to a remote host.
// Purpose: Provide a runnable host and client for BluQube contracts.
// Dependencies: clap, bluqube-config, bluqube-core, bluqube-http, tokio
// ============================================================================

//! ## Overview
//! `bluqube serve` hosts the todo handlers behind the HTTP endpoint.
//! `add-todo`, `complete-todo`, and `list-todos` dispatch through a
//! dispatcher with no local bindings, so every contract travels to the
//! configured `[remote]` endpoint. The resulting envelope is written to
//! stdout as JSON and mapped to the process exit code.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod telemetry;
mod todo;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bluqube_config::AuditConfig;
use bluqube_config::BluQubeConfig;
use bluqube_config::MAX_TIMEOUT_MS;
use bluqube_core::CancelSignal;
use bluqube_core::DispatchContext;
use bluqube_core::Dispatcher;
use bluqube_core::ResultEnvelope;
use bluqube_core::WireEndpoint;
use bluqube_core::runtime::DispatchAuditSink;
use bluqube_core::runtime::FileAuditSink;
use bluqube_core::runtime::NoopAuditSink;
use bluqube_core::runtime::StderrAuditSink;
use bluqube_core::runtime::codec;
use bluqube_http::HttpEndpoint;
use bluqube_http::HttpTransport;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

use crate::todo::AddTodoCommand;
use crate::todo::CompleteTodoCommand;
use crate::todo::GetTodosQuery;
use crate::todo::InMemoryTodoRepository;
use crate::todo::todo_registry;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "bluqube", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to `BLUQUBE_CONFIG`, then `bluqube.toml`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Cancel the dispatch after this many milliseconds.
    #[arg(
        long = "timeout-ms",
        value_name = "MS",
        global = true,
        value_parser = clap::value_parser!(u64).range(1 ..= MAX_TIMEOUT_MS)
    )]
    timeout_ms: Option<u64>,
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the todo handlers over HTTP.
    Serve,
    /// Add a todo on the remote host.
    AddTodo(AddTodoArgs),
    /// Complete a todo on the remote host.
    CompleteTodo(CompleteTodoArgs),
    /// List todos on the remote host.
    ListTodos,
}

/// Arguments for `add-todo`.
#[derive(Args, Debug)]
struct AddTodoArgs {
    /// Title of the new todo.
    #[arg(long)]
    title: String,
}

/// Arguments for `complete-todo`.
#[derive(Args, Debug)]
struct CompleteTodoArgs {
    /// Identifier of the todo.
    #[arg(long)]
    id: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failure with a printable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
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
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the parsed command.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    let config = BluQubeConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    telemetry::initialise(&config.logging)
        .map_err(|err| CliError::new(format!("telemetry init failed: {err}")))?;
    let audit = build_audit_sink(&config.audit)?;

    match cli.command {
        Commands::Serve => command_serve(&config, audit).await,
        Commands::AddTodo(args) => {
            let dispatcher = remote_dispatcher(&config, audit)?;
            let command = AddTodoCommand {
                title: args.title,
            };
            let envelope = dispatcher.send(command, &dispatch_context(cli.timeout_ms)).await;
            emit_envelope(&envelope)
        }
        Commands::CompleteTodo(args) => {
            let dispatcher = remote_dispatcher(&config, audit)?;
            let command = CompleteTodoCommand {
                id: args.id,
            };
            let envelope = dispatcher.send(command, &dispatch_context(cli.timeout_ms)).await;
            emit_envelope(&envelope)
        }
        Commands::ListTodos => {
            let dispatcher = remote_dispatcher(&config, audit)?;
            let envelope = dispatcher.query(GetTodosQuery, &dispatch_context(cli.timeout_ms)).await;
            emit_envelope(&envelope)
        }
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(
    config: &BluQubeConfig,
    audit: Arc<dyn DispatchAuditSink>,
) -> CliResult<ExitCode> {
    let addr = config.server.socket_addr().map_err(|err| CliError::new(err.to_string()))?;
    if !addr.ip().is_loopback() && config.server.principals.is_empty() {
        tracing::warn!(%addr, "serving on a non-loopback address without configured principals");
    }
    let repository = Arc::new(InMemoryTodoRepository::new());
    let registry = todo_registry(&repository)
        .map_err(|err| CliError::new(format!("registry build failed: {err}")))?;
    let endpoint = WireEndpoint::new(registry).with_audit(audit);
    HttpEndpoint::new(endpoint, &config.server)
        .serve(addr)
        .await
        .map_err(|err| CliError::new(format!("serve failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Client Commands
// ============================================================================

/// Builds a dispatcher that forwards every contract to `[remote]`.
fn remote_dispatcher(
    config: &BluQubeConfig,
    audit: Arc<dyn DispatchAuditSink>,
) -> CliResult<Dispatcher> {
    let remote = config
        .remote
        .as_ref()
        .ok_or_else(|| CliError::new("no [remote] endpoint configured".to_string()))?;
    let transport = HttpTransport::from_config(remote)
        .map_err(|err| CliError::new(format!("remote transport failed: {err}")))?;
    Ok(Dispatcher::remote_only(Arc::new(transport)).with_audit(audit))
}

/// Dispatch context with an optional deadline.
fn dispatch_context(timeout_ms: Option<u64>) -> DispatchContext {
    let cancel = CancelSignal::new();
    if let Some(timeout_ms) = timeout_ms {
        cancel.cancel_after(Duration::from_millis(timeout_ms));
    }
    DispatchContext::anonymous().with_cancel(cancel)
}

/// Selects the audit sink from `[audit]`.
fn build_audit_sink(config: &AuditConfig) -> CliResult<Arc<dyn DispatchAuditSink>> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path.trim()))
                .map_err(|err| CliError::new(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Process exit status for an envelope.
const fn exit_status<T>(envelope: &ResultEnvelope<T>) -> u8 {
    match envelope {
        ResultEnvelope::Succeeded(_) => 0,
        ResultEnvelope::Failed(_) => 1,
        ResultEnvelope::ValidationFailed(_) => 2,
        ResultEnvelope::Unauthorized(_) => 3,
    }
}

/// Writes the envelope to stdout and maps it to an exit code.
fn emit_envelope<T: Serialize>(envelope: &ResultEnvelope<T>) -> CliResult<ExitCode> {
    let mut buffer = codec::encode_envelope(envelope);
    buffer.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout
        .write_all(&buffer)
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(ExitCode::from(exit_status(envelope)))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
