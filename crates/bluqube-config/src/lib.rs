// crates/bluqube-config/src/lib.rs
// ============================================================================
// Module: BluQube Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for bluqube.toml semantics.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! `bluqube-config` defines the configuration model shared by the HTTP
//! endpoint, the HTTP transport, and the `bluqube` binary. Validation is
//! strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
