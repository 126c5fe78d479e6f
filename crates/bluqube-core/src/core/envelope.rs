// crates/bluqube-core/src/core/envelope.rs
// ============================================================================
// Module: BluQube Result Envelope
// Description: Uniform outcome wrapper for every dispatch.
// Purpose: Hide execution mode from callers behind one result shape.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every dispatch, local or remote, ends in a [`ResultEnvelope`]. The wire
//! form is adjacently tagged:
//!
//! ```json
//! {"status":"validation_failed","detail":[{"field":"Title","message":"must not be empty"}]}
//! ```
//!
//! Commands use `ResultEnvelope<()>`, which encodes `"detail": null` on
//! success. Failure messages are generic; internal detail is logged at the
//! dispatcher boundary and never carried here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RoutingKey;

// ============================================================================
// SECTION: Validation Outcome
// ============================================================================

/// Single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Field the rule applies to.
    pub field: String,
    /// Rendered message.
    pub message: String,
}

impl ValidationFailure {
    /// Creates a validation failure.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Ordered validation failures; empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationOutcome {
    /// Failures in rule registration order.
    failures: Vec<ValidationFailure>,
}

impl ValidationOutcome {
    /// Returns an empty (valid) outcome.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            failures: Vec::new(),
        }
    }

    /// Builds an outcome from failures.
    #[must_use]
    pub const fn from_failures(failures: Vec<ValidationFailure>) -> Self {
        Self {
            failures,
        }
    }

    /// Returns true when no rule failed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the failures.
    #[must_use]
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Returns `(field, message)` pairs, convenient for assertions and UIs.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.failures.iter().map(|f| (f.field.as_str(), f.message.as_str())).collect()
    }

    /// Number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Returns true when there are no failures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl FromIterator<ValidationFailure> for ValidationOutcome {
    fn from_iter<I: IntoIterator<Item = ValidationFailure>>(iter: I) -> Self {
        Self {
            failures: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// SECTION: Authorization Outcome
// ============================================================================

/// Reason code when no policy supplied one.
pub const REASON_DENIED: &str = "denied";

/// Authorization decision with an optional reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationOutcome {
    /// Whether the caller may proceed.
    pub allowed: bool,
    /// Short reason code for denials.
    pub reason: Option<String>,
}

impl AuthorizationOutcome {
    /// Allow decision.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Deny decision with a reason code.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// Returns the reason code, falling back to [`REASON_DENIED`].
    #[must_use]
    pub fn reason_code(&self) -> &str {
        self.reason.as_deref().unwrap_or(REASON_DENIED)
    }
}

// ============================================================================
// SECTION: Failures
// ============================================================================

/// Stable failure codes carried by [`ResultEnvelope::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// No handler bound locally and no remote endpoint available.
    UnboundContract,
    /// Routing key bound to a different contract type or kind.
    ContractMismatch,
    /// Wire payload could not be decoded into the contract.
    MalformedPayload,
    /// Network, encoding, or decoding failure on the transport.
    TransportFailure,
    /// Caller cancelled the dispatch.
    Cancelled,
    /// Handler failed or panicked.
    HandlerFault,
}

impl FailureCode {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnboundContract => "unbound_contract",
            Self::ContractMismatch => "contract_mismatch",
            Self::MalformedPayload => "malformed_payload",
            Self::TransportFailure => "transport_failure",
            Self::Cancelled => "cancelled",
            Self::HandlerFault => "handler_fault",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure code plus a caller-safe message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure classification.
    pub code: FailureCode,
    /// Generic, caller-safe message.
    pub message: String,
}

impl Failure {
    /// Creates a failure.
    #[must_use]
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// No handler for the routing key.
    #[must_use]
    pub fn unbound(routing_key: &RoutingKey) -> Self {
        Self::new(FailureCode::UnboundContract, format!("no handler bound for {routing_key}"))
    }

    /// Routing key that no registry accepts.
    #[must_use]
    pub fn invalid_routing_key(routing_key: &RoutingKey) -> Self {
        Self::new(FailureCode::UnboundContract, format!("invalid routing key {routing_key}"))
    }

    /// Routing key bound to another contract.
    #[must_use]
    pub fn contract_mismatch(routing_key: &RoutingKey) -> Self {
        Self::new(
            FailureCode::ContractMismatch,
            format!("{routing_key} is bound to a different contract"),
        )
    }

    /// Payload could not be decoded.
    #[must_use]
    pub fn malformed_payload(routing_key: &RoutingKey) -> Self {
        Self::new(FailureCode::MalformedPayload, format!("malformed payload for {routing_key}"))
    }

    /// Transport round-trip failed.
    #[must_use]
    pub fn transport() -> Self {
        Self::new(FailureCode::TransportFailure, "transport failure")
    }

    /// Dispatch cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(FailureCode::Cancelled, "cancelled")
    }

    /// Handler failed.
    #[must_use]
    pub fn handler_fault() -> Self {
        Self::new(FailureCode::HandlerFault, "handler failed")
    }
}

// ============================================================================
// SECTION: Result Envelope
// ============================================================================

/// Uniform dispatch outcome; exactly one variant is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ResultEnvelope<T> {
    /// Handler completed; `()` for commands.
    Succeeded(T),
    /// One or more validation rules failed; the handler did not run.
    ValidationFailed(ValidationOutcome),
    /// A policy denied the caller; carries the reason code only.
    Unauthorized(String),
    /// Dispatch failed.
    Failed(Failure),
}

impl<T> ResultEnvelope<T> {
    /// Returns the stable status label.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "succeeded",
            Self::ValidationFailed(_) => "validation_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::Failed(_) => "failed",
        }
    }

    /// Returns true for [`ResultEnvelope::Succeeded`].
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns the success payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        match self {
            Self::Succeeded(payload) => Some(payload),
            _ => None,
        }
    }

    /// Consumes the envelope, returning the success payload.
    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        match self {
            Self::Succeeded(payload) => Some(payload),
            _ => None,
        }
    }

    /// Returns the failure code for [`ResultEnvelope::Failed`].
    #[must_use]
    pub const fn failure_code(&self) -> Option<FailureCode> {
        match self {
            Self::Failed(failure) => Some(failure.code),
            _ => None,
        }
    }

    /// Maps the success payload, leaving other variants intact.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResultEnvelope<U> {
        match self {
            Self::Succeeded(payload) => ResultEnvelope::Succeeded(f(payload)),
            Self::ValidationFailed(outcome) => ResultEnvelope::ValidationFailed(outcome),
            Self::Unauthorized(reason) => ResultEnvelope::Unauthorized(reason),
            Self::Failed(failure) => ResultEnvelope::Failed(failure),
        }
    }

    /// Shorthand for a failed envelope.
    #[must_use]
    pub const fn failed(failure: Failure) -> Self {
        Self::Failed(failure)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
