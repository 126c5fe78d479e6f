// crates/bluqube-core/src/runtime/codec.rs
// ============================================================================
// Module: BluQube Wire Codec
// Description: JSON encoding for contracts and result envelopes.
// Purpose: Keep the on-wire shape in one place for every transport.
// Dependencies: serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! Contracts travel as their serde JSON form; responses are a JSON
//! [`ResultEnvelope`]. Envelope encoding never fails from the caller's point
//! of view: if serialization breaks, a fixed transport-failure envelope is
//! written instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::Failure;
use crate::core::ResultEnvelope;
use crate::interfaces::TransportError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Media type for every body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Envelope emitted when envelope encoding itself fails.
pub const FALLBACK_ENVELOPE: &[u8] =
    br#"{"status":"failed","detail":{"code":"transport_failure","message":"transport failure"}}"#;

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a contract for the wire.
///
/// # Errors
///
/// Returns [`TransportError::Encode`] when serialization fails.
pub fn encode<T: Serialize>(contract: &T) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(contract).map_err(|err| TransportError::Encode(err.to_string()))
}

/// Decodes a contract from the wire.
///
/// # Errors
///
/// Returns [`TransportError::Decode`] when the body is not a valid contract.
pub fn decode_contract<T: DeserializeOwned>(body: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(body).map_err(|err| TransportError::Decode(err.to_string()))
}

/// Encodes an envelope, falling back to [`FALLBACK_ENVELOPE`].
#[must_use]
pub fn encode_envelope<T: Serialize>(envelope: &ResultEnvelope<T>) -> Vec<u8> {
    serde_json::to_vec(envelope).unwrap_or_else(|err| {
        tracing::error!(error = %err, "envelope encode failed");
        FALLBACK_ENVELOPE.to_vec()
    })
}

/// Decodes an envelope; undecodable bodies become a transport failure.
#[must_use]
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> ResultEnvelope<T> {
    serde_json::from_slice(body).unwrap_or_else(|err| {
        tracing::warn!(error = %err, bytes = body.len(), "envelope decode failed");
        ResultEnvelope::Failed(Failure::transport())
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
