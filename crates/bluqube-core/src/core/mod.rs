// crates/bluqube-core/src/core/mod.rs
// ============================================================================
// Module: BluQube Core Types
// Description: Contracts, identifiers, envelopes, caller context, cancellation.
// Purpose: Shared vocabulary for the dispatch runtime and its transports.
// Dependencies: serde, thiserror, tokio
// ============================================================================

//! ## Overview
//! Transport-neutral data types. Nothing here performs I/O.

pub mod caller;
pub mod cancel;
pub mod contract;
pub mod envelope;
pub mod identifiers;

pub use caller::CallerContext;
pub use cancel::CancelSignal;
pub use contract::Command;
pub use contract::CommandResult;
pub use contract::ContractDescriptor;
pub use contract::Query;
pub use contract::QueryResult;
pub use envelope::AuthorizationOutcome;
pub use envelope::Failure;
pub use envelope::FailureCode;
pub use envelope::REASON_DENIED;
pub use envelope::ResultEnvelope;
pub use envelope::ValidationFailure;
pub use envelope::ValidationOutcome;
pub use identifiers::ContractKind;
pub use identifiers::MAX_ROUTING_KEY_LENGTH;
pub use identifiers::RoutingKey;
pub use identifiers::RoutingKeyError;
