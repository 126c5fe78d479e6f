// crates/bluqube-http/src/server.rs
// ============================================================================
// Module: BluQube HTTP Endpoint
// Description: axum server exposing the wire endpoint over HTTP.
// Purpose: Accept remote contracts and answer with result envelopes.
// Dependencies: axum, bluqube-core, tokio, tracing
// ============================================================================

//! ## Overview
//! Every contract is served at `POST {base_path}/{routing_key}` with the
//! contract kind in the `x-bluqube-contract-kind` header and the contract's
//! JSON form as the body. Any pipeline outcome, including `unauthorized`
//! and `failed`, is returned as an envelope with status 200. Requests that
//! never reach the pipeline get 400 (bad key or kind) or 413 (body over the
//! limit), still with a `failed` envelope body.
//!
//! Security posture: bodies and headers are untrusted; the body is read with
//! a hard cap and the caller is resolved before any decode. A dropped
//! connection drops the in-flight dispatch, which aborts the handler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use bluqube_config::ServerConfig;
use bluqube_core::CancelSignal;
use bluqube_core::ContractKind;
use bluqube_core::Failure;
use bluqube_core::ResultEnvelope;
use bluqube_core::RoutingKey;
use bluqube_core::WireEndpoint;
use bluqube_core::WireRequest;
use bluqube_core::runtime::codec;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::auth::PrincipalTable;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the contract kind.
pub const CONTRACT_KIND_HEADER: &str = "x-bluqube-contract-kind";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum HttpServerError {
    /// Listener could not bind or the server loop failed.
    #[error("http transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// HTTP front for a [`WireEndpoint`].
#[derive(Clone)]
pub struct HttpEndpoint {
    /// Shared request state.
    state: Arc<ServerState>,
    /// Path prefix for contract routes.
    base_path: String,
}

/// Shared state for request handlers.
struct ServerState {
    /// Byte-level dispatch target.
    endpoint: WireEndpoint,
    /// Bearer token principals.
    principals: PrincipalTable,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
}

impl HttpEndpoint {
    /// Builds an endpoint from `[server]` configuration.
    #[must_use]
    pub fn new(endpoint: WireEndpoint, config: &ServerConfig) -> Self {
        Self {
            state: Arc::new(ServerState {
                endpoint,
                principals: PrincipalTable::from_config(config),
                max_body_bytes: config.max_body_bytes,
            }),
            base_path: config.base_path.clone(),
        }
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        let route = format!("{}/{{*routing_key}}", self.base_path);
        Router::new().route(&route, post(handle_contract)).with_state(Arc::clone(&self.state))
    }

    /// Binds `addr` and serves until the server loop fails.
    ///
    /// # Errors
    ///
    /// Returns [`HttpServerError`] when binding or serving fails.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), HttpServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| HttpServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_listener(listener).await
    }

    /// Serves on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`HttpServerError`] when the server loop fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), HttpServerError> {
        let local = listener
            .local_addr()
            .map_err(|err| HttpServerError::Transport(format!("listener address: {err}")))?;
        tracing::info!(
            addr = %local,
            base_path = %self.base_path,
            contracts = self.state.endpoint.registry().len(),
            principals = self.state.principals.len(),
            "bluqube http endpoint listening"
        );
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| HttpServerError::Transport(format!("http server failed: {err}")))
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles one contract request.
async fn handle_contract(
    State(state): State<Arc<ServerState>>,
    Path(raw_key): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let routing_key = match RoutingKey::parse(&raw_key) {
        Ok(key) => key,
        Err(err) => {
            tracing::debug!(error = %err, "rejected routing key");
            let failure = Failure::malformed_payload(&RoutingKey::new(raw_key));
            return envelope_response(StatusCode::BAD_REQUEST, &ResultEnvelope::<()>::Failed(failure));
        }
    };
    let Some(kind) = headers
        .get(CONTRACT_KIND_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(ContractKind::parse)
    else {
        let failure = Failure::malformed_payload(&routing_key);
        return envelope_response(StatusCode::BAD_REQUEST, &ResultEnvelope::<()>::Failed(failure));
    };

    let auth_header = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    let caller = match state.principals.resolve(auth_header) {
        Ok(caller) => caller,
        Err(err) => {
            tracing::debug!(routing_key = %routing_key, error = %err, "caller rejected");
            let envelope = ResultEnvelope::<()>::Unauthorized(err.reason_code().to_string());
            return envelope_response(StatusCode::OK, &envelope);
        }
    };

    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(routing_key = %routing_key, error = %err, "request body rejected");
            let failure = Failure::malformed_payload(&routing_key);
            return envelope_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &ResultEnvelope::<()>::Failed(failure),
            );
        }
    };

    let request = WireRequest {
        routing_key,
        kind,
        body: bytes.to_vec(),
    };
    let response = state.endpoint.handle(request, Arc::new(caller), &CancelSignal::new()).await;
    json_response(StatusCode::OK, response.body)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes an envelope response.
fn envelope_response(status: StatusCode, envelope: &ResultEnvelope<()>) -> Response {
    json_response(status, codec::encode_envelope(envelope))
}

/// Builds a JSON response with `status`.
fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(CONTENT_TYPE, HeaderValue::from_static(codec::CONTENT_TYPE_JSON))], body)
        .into_response()
}
