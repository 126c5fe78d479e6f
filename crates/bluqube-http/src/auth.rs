// crates/bluqube-http/src/auth.rs
// ============================================================================
// Module: BluQube HTTP Caller Resolution
// Description: Bearer token authentication for inbound HTTP requests.
// Purpose: Turn an Authorization header into a caller context, fail closed.
// Dependencies: bluqube-config, bluqube-core, sha2
// ============================================================================

//! ## Overview
//! Inbound requests authenticate with `Authorization: Bearer <token>`. Tokens
//! map to configured principals; the caller context carries the principal's
//! subject, roles, and claims plus a sha256 fingerprint of the token. The raw
//! token never leaves this module.
//!
//! Requests without a header run as the anonymous caller when the server
//! allows it. A malformed header or an unknown token is always rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt::Write as _;

use bluqube_config::ServerConfig;
use bluqube_core::CallerContext;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

/// Reason returned when a credential is required but absent.
pub const REASON_UNAUTHENTICATED: &str = "unauthenticated";

/// Reason returned for malformed or unknown credentials.
pub const REASON_INVALID_TOKEN: &str = "invalid_token";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Caller resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No credential and anonymous access is disabled.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Credential present but malformed or unknown.
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl AuthError {
    /// Stable reason code placed in the `unauthorized` envelope.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => REASON_UNAUTHENTICATED,
            Self::InvalidToken(_) => REASON_INVALID_TOKEN,
        }
    }
}

// ============================================================================
// SECTION: Principal Table
// ============================================================================

/// Token to caller lookup built from server configuration.
#[derive(Debug, Clone)]
pub struct PrincipalTable {
    /// Caller contexts keyed by raw token.
    by_token: HashMap<String, CallerContext>,
    /// Whether header-less requests run as anonymous.
    allow_anonymous: bool,
}

impl PrincipalTable {
    /// Builds the table from `[server]` configuration.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let by_token = config
            .principals
            .iter()
            .map(|principal| {
                let mut caller = CallerContext::authenticated(principal.subject.clone())
                    .with_fingerprint(token_fingerprint(&principal.token));
                for role in &principal.roles {
                    caller = caller.with_role(role.clone());
                }
                for (key, value) in &principal.claims {
                    caller = caller.with_claim(key.clone(), value.clone());
                }
                (principal.token.clone(), caller)
            })
            .collect();
        Self {
            by_token,
            allow_anonymous: config.allow_anonymous,
        }
    }

    /// Number of configured principals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Returns true when no principals are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Resolves the caller for an optional `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the header is required, malformed, or names
    /// an unknown token.
    pub fn resolve(&self, auth_header: Option<&str>) -> Result<CallerContext, AuthError> {
        let Some(header) = auth_header else {
            if self.allow_anonymous {
                return Ok(CallerContext::anonymous());
            }
            return Err(AuthError::Unauthenticated("missing authorization".to_string()));
        };
        let token = parse_bearer_token(header)?;
        self.by_token
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown bearer token".to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from a `Bearer` header value.
fn parse_bearer_token(header: &str) -> Result<&str, AuthError> {
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::InvalidToken("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidToken("invalid authorization header".to_string()));
    }
    Ok(token)
}

/// Lowercase hex sha256 of a token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
