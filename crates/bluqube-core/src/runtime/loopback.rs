// crates/bluqube-core/src/runtime/loopback.rs
// ============================================================================
// Module: BluQube Loopback Transport
// Description: In-memory transport wired directly to a wire endpoint.
// Purpose: Exercise the full remote path without a network.
// Dependencies: async-trait
// ============================================================================

//! ## Overview
//! [`LoopbackTransport`] encodes and decodes exactly like a network
//! transport but hands the bytes straight to a [`WireEndpoint`]. The serving
//! side sees a fixed caller, standing in for whatever credential a real
//! transport would have resolved.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::CallerContext;
use crate::core::CancelSignal;
use crate::interfaces::Transport;
use crate::interfaces::TransportError;
use crate::interfaces::WireRequest;
use crate::interfaces::WireResponse;
use crate::runtime::endpoint::WireEndpoint;

/// Transport that serves requests in-process.
#[derive(Clone)]
pub struct LoopbackTransport {
    /// Serving endpoint.
    endpoint: WireEndpoint,
    /// Caller presented to the endpoint.
    caller: Arc<CallerContext>,
}

impl LoopbackTransport {
    /// Loopback to `endpoint` as an anonymous caller.
    #[must_use]
    pub fn new(endpoint: WireEndpoint) -> Self {
        Self::with_caller(endpoint, CallerContext::anonymous())
    }

    /// Loopback to `endpoint` as `caller`.
    #[must_use]
    pub fn with_caller(endpoint: WireEndpoint, caller: CallerContext) -> Self {
        Self {
            endpoint,
            caller: Arc::new(caller),
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn round_trip(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        // Dropping this future drops the pipeline, which aborts the handler task.
        let cancel = CancelSignal::new();
        Ok(self.endpoint.handle(request, Arc::clone(&self.caller), &cancel).await)
    }
}
