// crates/bluqube-cli/src/telemetry.rs
// ============================================================================
// Module: CLI Telemetry
// Description: tracing subscriber installation from logging configuration.
// Purpose: Route diagnostics to stderr so stdout stays machine-readable.
// Dependencies: bluqube-config, once_cell, tracing-subscriber
// ============================================================================

//! ## Overview
//! Installs one global subscriber per process. Output always goes to stderr;
//! stdout carries only command results.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::IsTerminal;

use bluqube_config::LogFormat;
use bluqube_config::LoggingConfig;
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

// ============================================================================
// SECTION: State
// ============================================================================

/// Set once the global subscriber is installed.
static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Telemetry setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter expression does not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber is already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

// ============================================================================
// SECTION: Installation
// ============================================================================

/// Installs the global subscriber on first call; later calls are no-ops.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or installation fails.
pub fn initialise(config: &LoggingConfig) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD.get_or_try_init(|| install_subscriber(config)).map(|_| ())
}

/// Parses the configured filter.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the directives do not parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(config.filter.trim()).map_err(|err| TelemetryError::Filter(err.to_string()))
}

/// Builds and installs the subscriber.
fn install_subscriber(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
    };
    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
