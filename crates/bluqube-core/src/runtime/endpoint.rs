// crates/bluqube-core/src/runtime/endpoint.rs
// ============================================================================
// Module: BluQube Wire Endpoint
// Description: Serves encoded contracts against the local registry.
// Purpose: Give every inbound transport the same byte-level dispatch path.
// Dependencies: serde_json, tracing
// ============================================================================

//! ## Overview
//! A [`WireEndpoint`] is the receiving half of the remote path. Transports
//! (HTTP, loopback) hand it a [`WireRequest`] and the resolved caller; it
//! runs the same validate/authorize/handle pipeline as a local dispatch and
//! returns the encoded envelope. Requests for keys bound to the other
//! contract kind fail with `contract_mismatch`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::CallerContext;
use crate::core::CancelSignal;
use crate::core::Failure;
use crate::core::ResultEnvelope;
use crate::interfaces::WireRequest;
use crate::interfaces::WireResponse;
use crate::runtime::audit::DispatchAuditEvent;
use crate::runtime::audit::DispatchAuditSink;
use crate::runtime::audit::EVENT_INBOUND;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::codec;
use crate::runtime::dispatcher::ExecutionMode;
use crate::runtime::registry::HandlerRegistry;

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// Byte-level dispatch over the sealed registry.
#[derive(Clone)]
pub struct WireEndpoint {
    /// Sealed local bindings.
    registry: HandlerRegistry,
    /// Audit sink for inbound requests.
    audit: Arc<dyn DispatchAuditSink>,
}

impl WireEndpoint {
    /// Creates an endpoint over `registry`.
    #[must_use]
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn DispatchAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Sealed registry.
    #[must_use]
    pub const fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Serves one request and returns the encoded envelope.
    pub async fn handle(
        &self,
        request: WireRequest,
        caller: Arc<CallerContext>,
        cancel: &CancelSignal,
    ) -> WireResponse {
        let envelope = self.dispatch(&request, Arc::clone(&caller), cancel).await;
        WireResponse {
            body: codec::encode_envelope(&envelope),
        }
    }

    /// Serves one request and returns the decoded envelope.
    pub async fn dispatch(
        &self,
        request: &WireRequest,
        caller: Arc<CallerContext>,
        cancel: &CancelSignal,
    ) -> ResultEnvelope<Value> {
        let started = Instant::now();
        let (mode, envelope) = match self.registry.resolve(request.routing_key.as_str()) {
            None => {
                tracing::debug!(routing_key = %request.routing_key, "inbound contract unbound");
                (ExecutionMode::Unroutable, ResultEnvelope::Failed(Failure::unbound(&request.routing_key)))
            }
            Some(binding) if binding.kind() != request.kind => {
                tracing::debug!(
                    routing_key = %request.routing_key,
                    bound = %binding.kind(),
                    requested = %request.kind,
                    "inbound contract kind mismatch"
                );
                (
                    ExecutionMode::Local,
                    ResultEnvelope::Failed(Failure::contract_mismatch(&request.routing_key)),
                )
            }
            Some(binding) => {
                let envelope = if cancel.is_cancelled() {
                    ResultEnvelope::Failed(Failure::cancelled())
                } else {
                    binding.erased().run_wire(&request.body, Arc::clone(&caller), cancel).await
                };
                (ExecutionMode::Local, envelope)
            }
        };
        let event = DispatchAuditEvent::from_envelope(
            EVENT_INBOUND,
            &request.routing_key,
            request.kind,
            mode,
            &envelope,
            &caller,
            started.elapsed(),
        );
        self.audit.record(&event);
        envelope
    }
}
