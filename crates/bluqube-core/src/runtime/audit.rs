// crates/bluqube-core/src/runtime/audit.rs
// ============================================================================
// Module: BluQube Dispatch Audit
// Description: Structured audit events for dispatches and inbound requests.
// Purpose: Emit one redacted JSON record per dispatch outcome.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every dispatch and every inbound wire request produces one
//! [`DispatchAuditEvent`]. Events never carry payloads or credentials; the
//! subject is the only caller attribute recorded. Sinks decide where the
//! JSON line ends up.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::CallerContext;
use crate::core::ContractKind;
use crate::core::FailureCode;
use crate::core::ResultEnvelope;
use crate::core::RoutingKey;
use crate::runtime::dispatcher::ExecutionMode;

// ============================================================================
// SECTION: Event
// ============================================================================

/// Event label for caller-side dispatches.
pub const EVENT_DISPATCH: &str = "bluqube_dispatch";
/// Event label for requests served by a wire endpoint.
pub const EVENT_INBOUND: &str = "bluqube_inbound";

/// Dispatch audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Routing key dispatched.
    pub routing_key: String,
    /// Command or query.
    pub kind: ContractKind,
    /// Where the contract executed.
    pub mode: ExecutionMode,
    /// Envelope status label.
    pub status: &'static str,
    /// Failure code for failed envelopes.
    pub failure_code: Option<FailureCode>,
    /// Caller subject when authenticated.
    pub subject: Option<String>,
    /// Wall time spent in the dispatch.
    pub elapsed_ms: u128,
}

impl DispatchAuditEvent {
    /// Builds an event from a completed dispatch.
    #[must_use]
    pub fn from_envelope<T>(
        event: &'static str,
        routing_key: &RoutingKey,
        kind: ContractKind,
        mode: ExecutionMode,
        envelope: &ResultEnvelope<T>,
        caller: &CallerContext,
        elapsed: Duration,
    ) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            routing_key: routing_key.to_string(),
            kind,
            mode,
            status: envelope.status(),
            failure_code: envelope.failure_code(),
            subject: caller.subject.clone(),
            elapsed_ms: elapsed.as_millis(),
        }
    }
}

/// Milliseconds since the Unix epoch, zero if the clock is before it.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |duration| duration.as_millis())
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for dispatch events.
pub trait DispatchAuditSink: Send + Sync {
    /// Records a dispatch event.
    fn record(&self, event: &DispatchAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl DispatchAuditSink for StderrAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
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
}

impl DispatchAuditSink for FileAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl DispatchAuditSink for NoopAuditSink {
    fn record(&self, _event: &DispatchAuditEvent) {}
}

/// In-memory sink for tests and embedding hosts.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<DispatchAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<DispatchAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl DispatchAuditSink for MemoryAuditSink {
    fn record(&self, event: &DispatchAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
