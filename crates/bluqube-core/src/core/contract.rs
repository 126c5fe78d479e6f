// crates/bluqube-core/src/core/contract.rs
// ============================================================================
// Module: BluQube Message Contracts
// Description: Command and query contract traits.
// Purpose: Describe caller intent with a stable routing key.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Contracts are immutable descriptors of intent. A [`Command`] changes state
//! and succeeds without payload; a [`Query`] reads state and succeeds with
//! [`Query::Output`]. Both carry a `ROUTING_KEY` that must be unique across
//! the registry and stable across releases, since remote callers address the
//! contract by it.
//!
//! Contracts are serde types so the same value can be handed to a local
//! handler or encoded onto the wire without change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::envelope::ResultEnvelope;
use crate::core::identifiers::ContractKind;
use crate::core::identifiers::RoutingKey;

// ============================================================================
// SECTION: Contract Traits
// ============================================================================

/// State-changing contract.
pub trait Command: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable routing key, e.g. `commands/addtodo`.
    const ROUTING_KEY: &'static str;
}

/// Read-only contract producing a typed payload.
pub trait Query: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable routing key, e.g. `queries/gettodos`.
    const ROUTING_KEY: &'static str;

    /// Payload returned on success.
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// Envelope returned for every command dispatch.
pub type CommandResult = ResultEnvelope<()>;

/// Envelope returned for a query dispatch.
pub type QueryResult<Q> = ResultEnvelope<<Q as Query>::Output>;

// ============================================================================
// SECTION: Descriptors
// ============================================================================

/// Type-level description of a registered contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    /// Routing key of the contract.
    pub routing_key: RoutingKey,
    /// Command or query.
    pub kind: ContractKind,
    /// Rust type name, for diagnostics only.
    pub type_name: &'static str,
}

impl ContractDescriptor {
    /// Describes a command type.
    #[must_use]
    pub fn command<C: Command>() -> Self {
        Self {
            routing_key: RoutingKey::new(C::ROUTING_KEY),
            kind: ContractKind::Command,
            type_name: std::any::type_name::<C>(),
        }
    }

    /// Describes a query type.
    #[must_use]
    pub fn query<Q: Query>() -> Self {
        Self {
            routing_key: RoutingKey::new(Q::ROUTING_KEY),
            kind: ContractKind::Query,
            type_name: std::any::type_name::<Q>(),
        }
    }
}
