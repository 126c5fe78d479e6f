// crates/bluqube-http/src/client.rs
// ============================================================================
// Module: BluQube HTTP Transport
// Description: reqwest-based remote transport for unbound contracts.
// Purpose: Forward encoded contracts to a remote BluQube endpoint.
// Dependencies: bluqube-config, bluqube-core, reqwest, url
// ============================================================================

//! ## Overview
//! [`HttpTransport`] posts encoded contracts to
//! `{endpoint}/{routing_key}` and returns the response body for envelope
//! decoding. Redirects are never followed, responses are read with a hard
//! byte cap, and non-success statuses surface as transport errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use bluqube_config::RemoteConfig;
use bluqube_core::RoutingKey;
use bluqube_core::Transport;
use bluqube_core::TransportError;
use bluqube_core::WireRequest;
use bluqube_core::WireResponse;
use bluqube_core::runtime::codec;
use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

use crate::server::CONTRACT_KIND_HEADER;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport construction errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Configuration is unusable.
    #[error("http client config error: {0}")]
    Config(String),
    /// The reqwest client could not be built.
    #[error("http client build failed: {0}")]
    Build(String),
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Remote transport over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Underlying HTTP client.
    client: Client,
    /// Base URL including the remote base path.
    endpoint: Url,
    /// Headers sent with every request.
    headers: HeaderMap,
    /// Maximum accepted response body size.
    max_response_bytes: usize,
}

impl HttpTransport {
    /// Builds a transport for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] when the token is not a valid header value
    /// or the client cannot be constructed.
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        bearer_token: Option<&str>,
        max_response_bytes: usize,
    ) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| HttpClientError::Build(err.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(codec::CONTENT_TYPE_JSON));
        headers.insert(ACCEPT, HeaderValue::from_static(codec::CONTENT_TYPE_JSON));
        if let Some(token) = bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HttpClientError::Config("invalid bearer token header".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(Self {
            client,
            endpoint,
            headers,
            max_response_bytes,
        })
    }

    /// Builds a transport from `[remote]` configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError`] when the configuration is invalid.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, HttpClientError> {
        let endpoint =
            config.endpoint_url().map_err(|err| HttpClientError::Config(err.to_string()))?;
        Self::new(
            endpoint,
            config.timeout(),
            config.bearer_token.as_deref(),
            config.max_response_bytes,
        )
    }

    /// Remote base URL.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL for one routing key; keys that fail validation are refused.
    fn contract_url(&self, routing_key: &str) -> Result<String, TransportError> {
        let routing_key =
            RoutingKey::parse(routing_key).map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(format!("{}/{routing_key}", self.endpoint.as_str().trim_end_matches('/')))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let url = self.contract_url(request.routing_key.as_str())?;
        let response = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .header(CONTRACT_KIND_HEADER, request.kind.as_str())
            .body(request.body)
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;
        let status = response.status();
        let body = read_response_body_with_limit(response, self.max_response_bytes).await?;
        if !status.is_success() {
            return Err(TransportError::Request(format!("http status {}", status.as_u16())));
        }
        Ok(WireResponse {
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a response body while enforcing a hard byte limit.
async fn read_response_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    let mut total: usize = 0;
    while let Some(chunk) =
        response.chunk().await.map_err(|err| TransportError::Request(err.to_string()))?
    {
        let next_total = total.checked_add(chunk.len()).ok_or(TransportError::ResponseTooLarge {
            actual: usize::MAX,
            limit,
        })?;
        if next_total > limit {
            return Err(TransportError::ResponseTooLarge {
                actual: next_total,
                limit,
            });
        }
        body.extend_from_slice(&chunk);
        total = next_total;
    }
    Ok(body)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
