// crates/bluqube-core/src/core/caller.rs
// ============================================================================
// Module: BluQube Caller Context
// Description: Identity and claims of the dispatching caller.
// Purpose: Give authorization policies a transport-neutral view of the caller.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`CallerContext`] is what authorization policies inspect. It is resolved
//! by the inbound surface (bearer token table for HTTP, fixed context for the
//! loopback transport) and never carries raw credentials; only a
//! fingerprint of the presented token is kept for audit correlation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Caller Context
// ============================================================================

/// Caller identity, roles, and claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Authenticated subject, if any.
    pub subject: Option<String>,
    /// Granted roles.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Free-form claims.
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
    /// SHA-256 fingerprint of the presented credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_fingerprint: Option<String>,
}

impl CallerContext {
    /// Anonymous caller with no roles or claims.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated caller with the given subject.
    #[must_use]
    pub fn authenticated(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Adds a claim.
    #[must_use]
    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    /// Sets the credential fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.credential_fingerprint = Some(fingerprint.into());
        self
    }

    /// Returns true when a subject is present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }

    /// Returns true when the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns a claim value.
    #[must_use]
    pub fn claim(&self, key: &str) -> Option<&str> {
        self.claims.get(key).map(String::as_str)
    }
}
