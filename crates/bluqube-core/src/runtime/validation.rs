// crates/bluqube-core/src/runtime/validation.rs
// ============================================================================
// Module: BluQube Validation Stage
// Description: Declarative field rules evaluated before handler execution.
// Purpose: Reject malformed commands with every failed rule reported at once.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A [`Validator`] holds the rules registered for one command type. All rules
//! are evaluated; there is no short-circuit, so callers see every failure in
//! registration order. Queries are never validated.
//!
//! Message templates may use `{field}`, which is replaced with the field
//! name when a rule fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::core::ValidationFailure;
use crate::core::ValidationOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Message used by [`not_empty`].
pub const MSG_NOT_EMPTY: &str = "must not be empty";

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Single validation rule over a contract.
pub trait Rule<C>: Send + Sync {
    /// Returns a failure when the rule does not hold.
    fn check(&self, contract: &C) -> Option<ValidationFailure>;
}

/// Boxed validity predicate.
type Predicate<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

/// Field-scoped predicate rule with a message template.
pub struct FieldRule<C> {
    /// Field name reported on failure.
    field: String,
    /// Message template; `{field}` is substituted.
    template: String,
    /// Returns true when the contract is valid.
    predicate: Predicate<C>,
}

impl<C> FieldRule<C> {
    /// Creates a rule for `field` failing with `template` when `predicate` is false.
    pub fn new(
        field: impl Into<String>,
        template: impl Into<String>,
        predicate: impl Fn(&C) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            template: template.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl<C> fmt::Debug for FieldRule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl<C> Rule<C> for FieldRule<C> {
    fn check(&self, contract: &C) -> Option<ValidationFailure> {
        if (self.predicate)(contract) {
            return None;
        }
        let message = self.template.replace("{field}", &self.field);
        Some(ValidationFailure::new(self.field.clone(), message))
    }
}

/// String field must not be empty.
pub fn not_empty<C>(
    field: impl Into<String>,
    accessor: impl Fn(&C) -> &str + Send + Sync + 'static,
) -> FieldRule<C> {
    FieldRule::new(field, MSG_NOT_EMPTY, move |contract| !accessor(contract).is_empty())
}

/// String field must not exceed `max` characters.
pub fn max_length<C>(
    field: impl Into<String>,
    max: usize,
    accessor: impl Fn(&C) -> &str + Send + Sync + 'static,
) -> FieldRule<C> {
    FieldRule::new(field, format!("must be at most {max} characters"), move |contract| {
        accessor(contract).chars().count() <= max
    })
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Ordered rule set for one contract type.
pub struct Validator<C> {
    /// Rules in registration order.
    rules: Vec<Arc<dyn Rule<C>>>,
}

impl<C> Validator<C> {
    /// Empty validator; always valid.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rules: Vec::new(),
        }
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, rule: impl Rule<C> + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Appends a rule in place.
    pub fn push(&mut self, rule: Arc<dyn Rule<C>>) {
        self.rules.push(rule);
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates every rule and collects failures.
    #[must_use]
    pub fn validate(&self, contract: &C) -> ValidationOutcome {
        self.rules.iter().filter_map(|rule| rule.check(contract)).collect()
    }
}

impl<C> Default for Validator<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for Validator<C> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<C> fmt::Debug for Validator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").field("rules", &self.rules.len()).finish()
    }
}

/// Queries are always valid.
#[must_use]
pub const fn validate_query<Q>(_query: &Q) -> ValidationOutcome {
    ValidationOutcome::valid()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
