// crates/bluqube-core/src/lib.rs
// ============================================================================
// Module: BluQube Core Library
// Description: Public API surface for the BluQube dispatch core.
// Purpose: Expose contracts, handler seams, and the dispatcher.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! BluQube routes commands and queries to handlers through a sealed
//! registry. A contract bound in-process is validated, authorized, and
//! executed locally; an unbound contract is forwarded over a remote
//! [`Transport`]. Either way the caller receives a [`ResultEnvelope`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::CommandHandler;
pub use interfaces::HandlerContext;
pub use interfaces::HandlerError;
pub use interfaces::Policy;
pub use interfaces::QueryHandler;
pub use interfaces::Transport;
pub use interfaces::TransportError;
pub use interfaces::WireRequest;
pub use interfaces::WireResponse;
pub use runtime::CommandBinding;
pub use runtime::DispatchContext;
pub use runtime::Dispatcher;
pub use runtime::ExecutionMode;
pub use runtime::HandlerRegistry;
pub use runtime::LoopbackTransport;
pub use runtime::QueryBinding;
pub use runtime::RegistryBuilder;
pub use runtime::RegistryError;
pub use runtime::WireEndpoint;
