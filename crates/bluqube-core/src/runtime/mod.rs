// crates/bluqube-core/src/runtime/mod.rs
// ============================================================================
// Module: BluQube Runtime
// Description: Registry, pipeline stages, dispatcher, and in-process transport.
// Purpose: Execute contracts locally or forward them to a remote endpoint.
// Dependencies: crate::{core, interfaces}, tokio, tracing
// ============================================================================

//! ## Overview
//! Runtime modules implement registration, validation, authorization, and
//! dispatch. Local dispatch, HTTP endpoints, and the loopback transport all
//! run contracts through the same pipelines.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit;
pub mod authorization;
pub mod codec;
pub mod dispatcher;
pub mod endpoint;
pub mod loopback;
mod pipeline;
pub mod registry;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::DispatchAuditEvent;
pub use audit::DispatchAuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use authorization::PolicySet;
pub use authorization::RequireAnyRole;
pub use authorization::RequireAuthenticated;
pub use authorization::RequireClaim;
pub use authorization::RequireRole;
pub use dispatcher::DispatchContext;
pub use dispatcher::Dispatcher;
pub use dispatcher::ExecutionMode;
pub use endpoint::WireEndpoint;
pub use loopback::LoopbackTransport;
pub use registry::CommandBinding;
pub use registry::ContractBinding;
pub use registry::HandlerRegistry;
pub use registry::QueryBinding;
pub use registry::RegistryBuilder;
pub use registry::RegistryError;
pub use validation::FieldRule;
pub use validation::Rule;
pub use validation::Validator;
