// crates/bluqube-http/src/lib.rs
// ============================================================================
// Module: BluQube HTTP Library
// Description: HTTP endpoint and remote transport for BluQube contracts.
// Purpose: Carry contracts between processes over HTTP.
// Dependencies: crate::{auth, client, server}
// ============================================================================

//! ## Overview
//! The server half ([`HttpEndpoint`]) serves a sealed registry over HTTP;
//! the client half ([`HttpTransport`]) implements the core transport seam so
//! a dispatcher can forward unbound contracts to it. Both sides agree on the
//! routing-key path layout and the envelope body shape.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod client;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AuthError;
pub use auth::PrincipalTable;
pub use client::HttpClientError;
pub use client::HttpTransport;
pub use server::CONTRACT_KIND_HEADER;
pub use server::HttpEndpoint;
pub use server::HttpServerError;
