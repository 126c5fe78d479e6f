// crates/bluqube-core/src/runtime/authorization.rs
// ============================================================================
// Module: BluQube Authorization Stage
// Description: Policy sets and built-in caller policies.
// Purpose: Gate handler execution on caller identity, roles, and claims.
// Dependencies: async-trait, tracing
// ============================================================================

//! ## Overview
//! A [`PolicySet`] holds every policy attached to one contract. Policies are
//! combined with AND: the first denial wins and its reason code is returned.
//! A contract with no policies is allowed for every caller, including
//! anonymous ones.
//!
//! Built-in policies cover the common cases; applications can implement
//! [`Policy`] for anything else.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AuthorizationOutcome;
use crate::core::CallerContext;
use crate::core::RoutingKey;
use crate::interfaces::Policy;

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Caller has no subject.
pub const REASON_UNAUTHENTICATED: &str = "unauthenticated";
/// Caller lacks a required role.
pub const REASON_MISSING_ROLE: &str = "missing_role";
/// Caller lacks a required claim value.
pub const REASON_MISSING_CLAIM: &str = "missing_claim";

// ============================================================================
// SECTION: Policy Set
// ============================================================================

/// AND-combined policies for one contract.
#[derive(Clone, Default)]
pub struct PolicySet {
    /// Policies in registration order.
    policies: Vec<Arc<dyn Policy>>,
}

impl PolicySet {
    /// Empty set; allows every caller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a policy.
    pub fn push(&mut self, policy: Arc<dyn Policy>) {
        self.policies.push(policy);
    }

    /// Number of policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns true when no policies are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Evaluates policies in order and returns the first denial.
    pub async fn authorize(
        &self,
        caller: &CallerContext,
        routing_key: &RoutingKey,
    ) -> AuthorizationOutcome {
        for policy in &self.policies {
            let outcome = policy.evaluate(caller, routing_key).await;
            if !outcome.allowed {
                tracing::debug!(
                    routing_key = %routing_key,
                    policy = policy.name(),
                    reason = outcome.reason_code(),
                    "authorization denied"
                );
                return outcome;
            }
        }
        AuthorizationOutcome::allow()
    }
}

impl fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.policies.iter().map(|policy| policy.name()).collect();
        f.debug_struct("PolicySet").field("policies", &names).finish()
    }
}

// ============================================================================
// SECTION: Built-in Policies
// ============================================================================

/// Requires an authenticated subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAuthenticated;

#[async_trait]
impl Policy for RequireAuthenticated {
    fn name(&self) -> &str {
        "require_authenticated"
    }

    async fn evaluate(&self, caller: &CallerContext, _routing_key: &RoutingKey) -> AuthorizationOutcome {
        if caller.is_authenticated() {
            AuthorizationOutcome::allow()
        } else {
            AuthorizationOutcome::deny(REASON_UNAUTHENTICATED)
        }
    }
}

/// Requires a specific role.
#[derive(Debug, Clone)]
pub struct RequireRole {
    /// Role the caller must hold.
    role: String,
}

impl RequireRole {
    /// Creates the policy.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
        }
    }
}

#[async_trait]
impl Policy for RequireRole {
    fn name(&self) -> &str {
        "require_role"
    }

    async fn evaluate(&self, caller: &CallerContext, _routing_key: &RoutingKey) -> AuthorizationOutcome {
        if !caller.is_authenticated() {
            return AuthorizationOutcome::deny(REASON_UNAUTHENTICATED);
        }
        if caller.has_role(&self.role) {
            AuthorizationOutcome::allow()
        } else {
            AuthorizationOutcome::deny(REASON_MISSING_ROLE)
        }
    }
}

/// Requires at least one of several roles.
#[derive(Debug, Clone)]
pub struct RequireAnyRole {
    /// Acceptable roles.
    roles: Vec<String>,
}

impl RequireAnyRole {
    /// Creates the policy.
    #[must_use]
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Policy for RequireAnyRole {
    fn name(&self) -> &str {
        "require_any_role"
    }

    async fn evaluate(&self, caller: &CallerContext, _routing_key: &RoutingKey) -> AuthorizationOutcome {
        if !caller.is_authenticated() {
            return AuthorizationOutcome::deny(REASON_UNAUTHENTICATED);
        }
        if self.roles.iter().any(|role| caller.has_role(role)) {
            AuthorizationOutcome::allow()
        } else {
            AuthorizationOutcome::deny(REASON_MISSING_ROLE)
        }
    }
}

/// Requires a claim with an exact value.
#[derive(Debug, Clone)]
pub struct RequireClaim {
    /// Claim key.
    key: String,
    /// Required value.
    value: String,
}

impl RequireClaim {
    /// Creates the policy.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl Policy for RequireClaim {
    fn name(&self) -> &str {
        "require_claim"
    }

    async fn evaluate(&self, caller: &CallerContext, _routing_key: &RoutingKey) -> AuthorizationOutcome {
        if caller.claim(&self.key) == Some(self.value.as_str()) {
            AuthorizationOutcome::allow()
        } else {
            AuthorizationOutcome::deny(REASON_MISSING_CLAIM)
        }
    }
}
