// crates/bluqube-core/src/runtime/dispatcher.rs
// ============================================================================
// Module: BluQube Dispatcher
// Description: Caller-facing entry point for commands and queries.
// Purpose: Route contracts locally or remotely behind one result envelope.
// Dependencies: serde, tokio, tracing
// ============================================================================

//! ## Overview
//! [`Dispatcher::send`] and [`Dispatcher::query`] pick the execution mode
//! from the sealed registry:
//!
//! - bound locally: run the local pipeline (validate, authorize, handle)
//! - unbound with a remote transport: encode, round-trip, decode
//! - unbound without a transport: `Failed(UnboundContract)`
//!
//! A contract whose routing key fails [`RoutingKey::parse`] is never
//! dispatched; it fails as unbound. Callers cannot tell the modes apart
//! from the envelope alone. Remote
//! contracts are validated and authorized by the serving endpoint, not
//! here. Every dispatch emits one audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::CallerContext;
use crate::core::CancelSignal;
use crate::core::Command;
use crate::core::CommandResult;
use crate::core::ContractKind;
use crate::core::Failure;
use crate::core::Query;
use crate::core::QueryResult;
use crate::core::ResultEnvelope;
use crate::core::RoutingKey;
use crate::core::RoutingKeyError;
use crate::interfaces::Transport;
use crate::interfaces::WireRequest;
use crate::runtime::audit::DispatchAuditEvent;
use crate::runtime::audit::DispatchAuditSink;
use crate::runtime::audit::EVENT_DISPATCH;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::codec;
use crate::runtime::registry::HandlerRegistry;
use crate::runtime::registry::RegistryError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Where a contract executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Handler bound in this process.
    Local,
    /// Forwarded over the remote transport.
    Remote,
    /// Neither bound nor forwardable.
    Unroutable,
}

impl ExecutionMode {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Unroutable => "unroutable",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller and cancellation for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// Caller identity.
    pub caller: Arc<CallerContext>,
    /// Cancellation signal.
    pub cancel: CancelSignal,
}

impl DispatchContext {
    /// Context for `caller` with a fresh cancellation signal.
    #[must_use]
    pub fn new(caller: CallerContext) -> Self {
        Self {
            caller: Arc::new(caller),
            cancel: CancelSignal::new(),
        }
    }

    /// Anonymous caller context.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(CallerContext::anonymous())
    }

    /// Replaces the cancellation signal.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Routes contracts to local handlers or a remote transport.
#[derive(Clone)]
pub struct Dispatcher {
    /// Sealed local bindings.
    registry: HandlerRegistry,
    /// Remote transport for unbound contracts.
    remote: Option<Arc<dyn Transport>>,
    /// Audit sink.
    audit: Arc<dyn DispatchAuditSink>,
}

impl Dispatcher {
    /// Local-only dispatcher.
    #[must_use]
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            remote: None,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Dispatcher with no local bindings; everything goes remote.
    #[must_use]
    pub fn remote_only(transport: Arc<dyn Transport>) -> Self {
        Self::new(HandlerRegistry::empty()).with_remote(transport)
    }

    /// Sets the remote transport.
    #[must_use]
    pub fn with_remote(mut self, transport: Arc<dyn Transport>) -> Self {
        self.remote = Some(transport);
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn DispatchAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Sealed local registry.
    #[must_use]
    pub const fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Mode the dispatcher would pick for `routing_key`.
    #[must_use]
    pub fn execution_mode(&self, routing_key: &str) -> ExecutionMode {
        if self.registry.contains(routing_key) {
            ExecutionMode::Local
        } else if self.remote.is_some() {
            ExecutionMode::Remote
        } else {
            ExecutionMode::Unroutable
        }
    }

    /// Dispatches a command.
    pub async fn send<C: Command>(&self, command: C, ctx: &DispatchContext) -> CommandResult {
        let started = Instant::now();
        let routing_key = RoutingKey::new(C::ROUTING_KEY);
        let (mode, envelope) = if let Err(err) = RoutingKey::parse(C::ROUTING_KEY) {
            reject_routing_key(&routing_key, &err)
        } else if ctx.cancel.is_cancelled() {
            (self.execution_mode(C::ROUTING_KEY), ResultEnvelope::Failed(Failure::cancelled()))
        } else {
            match self.registry.command::<C>() {
                Ok(pipeline) => (
                    ExecutionMode::Local,
                    pipeline.run(command, Arc::clone(&ctx.caller), &ctx.cancel).await,
                ),
                Err(err) => {
                    self.route_unbound(&routing_key, ContractKind::Command, &command, &err, ctx).await
                }
            }
        };
        self.record(&routing_key, ContractKind::Command, mode, &envelope, ctx, started);
        envelope
    }

    /// Dispatches a query.
    pub async fn query<Q: Query>(&self, query: Q, ctx: &DispatchContext) -> QueryResult<Q> {
        let started = Instant::now();
        let routing_key = RoutingKey::new(Q::ROUTING_KEY);
        let (mode, envelope) = if let Err(err) = RoutingKey::parse(Q::ROUTING_KEY) {
            reject_routing_key(&routing_key, &err)
        } else if ctx.cancel.is_cancelled() {
            (self.execution_mode(Q::ROUTING_KEY), ResultEnvelope::Failed(Failure::cancelled()))
        } else {
            match self.registry.query::<Q>() {
                Ok(pipeline) => (
                    ExecutionMode::Local,
                    pipeline.run(query, Arc::clone(&ctx.caller), &ctx.cancel).await,
                ),
                Err(err) => {
                    self.route_unbound(&routing_key, ContractKind::Query, &query, &err, ctx).await
                }
            }
        };
        self.record(&routing_key, ContractKind::Query, mode, &envelope, ctx, started);
        envelope
    }

    /// Handles a contract with no usable local binding.
    async fn route_unbound<T, P>(
        &self,
        routing_key: &RoutingKey,
        kind: ContractKind,
        contract: &T,
        err: &RegistryError,
        ctx: &DispatchContext,
    ) -> (ExecutionMode, ResultEnvelope<P>)
    where
        T: Serialize + Sync,
        P: DeserializeOwned,
    {
        if !matches!(err, RegistryError::UnboundContract(_)) {
            tracing::error!(routing_key = %routing_key, error = %err, "local binding mismatch");
            return (ExecutionMode::Local, ResultEnvelope::Failed(Failure::contract_mismatch(routing_key)));
        }
        match &self.remote {
            Some(transport) => {
                let envelope =
                    remote_round_trip(transport.as_ref(), routing_key, kind, contract, &ctx.cancel).await;
                (ExecutionMode::Remote, envelope)
            }
            None => {
                tracing::debug!(routing_key = %routing_key, "no handler and no remote transport");
                (ExecutionMode::Unroutable, ResultEnvelope::Failed(Failure::unbound(routing_key)))
            }
        }
    }

    /// Emits the audit event for one dispatch.
    fn record<T>(
        &self,
        routing_key: &RoutingKey,
        kind: ContractKind,
        mode: ExecutionMode,
        envelope: &ResultEnvelope<T>,
        ctx: &DispatchContext,
        started: Instant,
    ) {
        let event = DispatchAuditEvent::from_envelope(
            EVENT_DISPATCH,
            routing_key,
            kind,
            mode,
            envelope,
            &ctx.caller,
            started.elapsed(),
        );
        self.audit.record(&event);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("remote", &self.remote.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Remote Path
// ============================================================================

/// Fails a contract whose routing key cannot address a binding.
fn reject_routing_key<P>(
    routing_key: &RoutingKey,
    err: &RoutingKeyError,
) -> (ExecutionMode, ResultEnvelope<P>) {
    tracing::error!(routing_key = %routing_key, error = %err, "contract routing key rejected");
    (ExecutionMode::Unroutable, ResultEnvelope::Failed(Failure::invalid_routing_key(routing_key)))
}

/// Encodes, sends, and decodes one contract over the transport.
async fn remote_round_trip<T, P>(
    transport: &dyn Transport,
    routing_key: &RoutingKey,
    kind: ContractKind,
    contract: &T,
    cancel: &CancelSignal,
) -> ResultEnvelope<P>
where
    T: Serialize,
    P: DeserializeOwned,
{
    let body = match codec::encode(contract) {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(routing_key = %routing_key, error = %err, "contract encode failed");
            return ResultEnvelope::Failed(Failure::transport());
        }
    };
    let request = WireRequest {
        routing_key: routing_key.clone(),
        kind,
        body,
    };
    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return ResultEnvelope::Failed(Failure::cancelled()),
        response = transport.round_trip(request) => response,
    };
    match response {
        Ok(response) => codec::decode_envelope(&response.body),
        Err(err) => {
            tracing::warn!(routing_key = %routing_key, error = %err, "remote dispatch failed");
            ResultEnvelope::Failed(Failure::transport())
        }
    }
}
