// crates/bluqube-core/src/interfaces/mod.rs
// ============================================================================
// Module: BluQube Interfaces
// Description: Handler, policy, and transport seams.
// Purpose: Define the extension points implemented by applications and transports.
// Dependencies: async-trait, thiserror
// ============================================================================

//! ## Overview
//! Applications implement [`CommandHandler`], [`QueryHandler`], and
//! [`Policy`]. Transports implement [`Transport`], which moves opaque
//! [`WireRequest`] bytes to a remote endpoint and returns the encoded
//! envelope. The runtime never inspects transport internals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::AuthorizationOutcome;
use crate::core::CallerContext;
use crate::core::CancelSignal;
use crate::core::Command;
use crate::core::ContractKind;
use crate::core::Query;
use crate::core::RoutingKey;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Per-dispatch context handed to handlers.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Routing key being executed.
    pub routing_key: RoutingKey,
    /// Caller the dispatch runs on behalf of.
    pub caller: Arc<CallerContext>,
    /// Cancellation signal for cooperative early exit.
    pub cancel: CancelSignal,
}

/// Handler failures.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler failed; message is logged, never returned to callers.
    #[error("handler fault: {0}")]
    Fault(String),
    /// Handler observed cancellation and stopped.
    #[error("handler cancelled")]
    Cancelled,
}

impl HandlerError {
    /// Wraps any displayable error as a fault.
    pub fn fault(err: impl std::fmt::Display) -> Self {
        Self::Fault(err.to_string())
    }
}

/// Executes one command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    /// Applies the command.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the command cannot be applied.
    async fn handle(&self, command: C, ctx: &HandlerContext) -> Result<(), HandlerError>;
}

/// Executes one query type.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    /// Answers the query.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the query cannot be answered.
    async fn handle(&self, query: Q, ctx: &HandlerContext) -> Result<Q::Output, HandlerError>;
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Authorization predicate over the caller.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Policy name for diagnostics.
    fn name(&self) -> &str;

    /// Evaluates the caller against this policy.
    async fn evaluate(&self, caller: &CallerContext, routing_key: &RoutingKey)
    -> AuthorizationOutcome;
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Encoded contract ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    /// Routing key addressing the contract.
    pub routing_key: RoutingKey,
    /// Command or query.
    pub kind: ContractKind,
    /// JSON-encoded contract.
    pub body: Vec<u8>,
}

/// Encoded envelope returned by the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// JSON-encoded result envelope.
    pub body: Vec<u8>,
}

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Contract could not be encoded.
    #[error("transport encode failed: {0}")]
    Encode(String),
    /// Request could not be sent or the endpoint answered with an error.
    #[error("transport request failed: {0}")]
    Request(String),
    /// Response exceeded the configured size limit.
    #[error("transport response too large: {actual} bytes exceeds {limit}")]
    ResponseTooLarge {
        /// Observed size.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Response could not be decoded.
    #[error("transport decode failed: {0}")]
    Decode(String),
}

/// Moves encoded contracts to a remote endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the encoded envelope.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on network, size, or protocol failures.
    async fn round_trip(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}
