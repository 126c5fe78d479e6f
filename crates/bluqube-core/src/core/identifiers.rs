// crates/bluqube-core/src/core/identifiers.rs
// ============================================================================
// Module: BluQube Identifiers
// Description: Routing keys and contract discriminators.
// Purpose: Provide the stable, serializable address of every contract.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`RoutingKey`] is the one piece of on-wire compatibility surface: it
//! addresses a contract both in the local registry and on the remote
//! transport. Keys are slash separated paths such as `commands/addtodo`.
//! [`RoutingKey::new`] wraps without checking; registration and inbound
//! transport requests go through [`RoutingKey::parse`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum routing key length in bytes.
pub const MAX_ROUTING_KEY_LENGTH: usize = 256;

// ============================================================================
// SECTION: Routing Key
// ============================================================================

/// Stable identifier of a contract type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingKey(String);

impl RoutingKey {
    /// Creates a routing key without validation.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Parses and validates a routing key.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingKeyError`] when the key is empty or too long, has an
    /// empty or dot segment, or contains characters outside `[a-z0-9._-]`.
    pub fn parse(key: &str) -> Result<Self, RoutingKeyError> {
        if key.is_empty() {
            return Err(RoutingKeyError::Empty);
        }
        if key.len() > MAX_ROUTING_KEY_LENGTH {
            return Err(RoutingKeyError::TooLong {
                max: MAX_ROUTING_KEY_LENGTH,
            });
        }
        for segment in key.split('/') {
            if segment.is_empty() {
                return Err(RoutingKeyError::EmptySegment(key.to_string()));
            }
            // URL resolution collapses these, so the wire key would differ.
            if segment == "." || segment == ".." {
                return Err(RoutingKeyError::DotSegment(key.to_string()));
            }
            if let Some(character) = segment.chars().find(|ch| !is_key_char(*ch)) {
                return Err(RoutingKeyError::InvalidCharacter {
                    key: key.to_string(),
                    character,
                });
            }
        }
        Ok(Self(key.to_string()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RoutingKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoutingKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for RoutingKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Routing key validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingKeyError {
    /// Key has no content.
    #[error("routing key must not be empty")]
    Empty,
    /// Key exceeds the length cap.
    #[error("routing key exceeds {max} bytes")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Key contains `//` or a leading/trailing slash.
    #[error("routing key has an empty segment: {0}")]
    EmptySegment(String),
    /// Key contains a `.` or `..` segment.
    #[error("routing key has a dot segment: {0}")]
    DotSegment(String),
    /// Key contains a character outside the allowed set.
    #[error("routing key {key} contains invalid character '{character}'")]
    InvalidCharacter {
        /// Offending key.
        key: String,
        /// First invalid character.
        character: char,
    },
}

/// Returns true for characters allowed in a routing key segment.
fn is_key_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '-' | '_' | '.')
}

// ============================================================================
// SECTION: Contract Kind
// ============================================================================

/// Discriminator between state-changing and read-only contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// Intent to change state; succeeds without payload.
    Command,
    /// Intent to read state; succeeds with a typed payload.
    Query,
}

impl ContractKind {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
        }
    }

    /// Parses a wire label (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "command" => Some(Self::Command),
            "query" => Some(Self::Query),
            _ => None,
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::ContractKind;
    use super::MAX_ROUTING_KEY_LENGTH;
    use super::RoutingKey;
    use super::RoutingKeyError;

    #[test]
    fn parse_accepts_slash_paths() {
        let key = RoutingKey::parse("commands/addtodo").unwrap();
        assert_eq!(key.as_str(), "commands/addtodo");
        assert!(RoutingKey::parse("queries/todo-items.v2").is_ok());
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert_eq!(RoutingKey::parse(""), Err(RoutingKeyError::Empty));
        assert!(matches!(
            RoutingKey::parse("commands//addtodo"),
            Err(RoutingKeyError::EmptySegment(_))
        ));
        assert!(matches!(RoutingKey::parse("/commands"), Err(RoutingKeyError::EmptySegment(_))));
    }

    #[test]
    fn parse_rejects_dot_segments() {
        for key in ["commands/admin/../addtodo", "commands/./addtodo", "..", "commands/."] {
            assert!(
                matches!(RoutingKey::parse(key), Err(RoutingKeyError::DotSegment(_))),
                "{key} must be rejected"
            );
        }
        assert!(RoutingKey::parse("commands/.hidden").is_ok());
        assert!(RoutingKey::parse("commands/.../addtodo").is_ok());
    }

    #[test]
    fn parse_rejects_uppercase_and_spaces() {
        let err = RoutingKey::parse("commands/AddTodo").unwrap_err();
        assert!(matches!(err, RoutingKeyError::InvalidCharacter { character: 'A', .. }));
        assert!(RoutingKey::parse("commands/add todo").is_err());
    }

    #[test]
    fn parse_rejects_oversized_keys() {
        let key = "a".repeat(MAX_ROUTING_KEY_LENGTH + 1);
        assert!(matches!(RoutingKey::parse(&key), Err(RoutingKeyError::TooLong { .. })));
    }

    #[test]
    fn contract_kind_labels_round_trip() {
        assert_eq!(ContractKind::parse("Command"), Some(ContractKind::Command));
        assert_eq!(ContractKind::parse(ContractKind::Query.as_str()), Some(ContractKind::Query));
        assert_eq!(ContractKind::parse("event"), None);
    }
}
