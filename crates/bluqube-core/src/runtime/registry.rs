// crates/bluqube-core/src/runtime/registry.rs
// ============================================================================
// Module: BluQube Handler Registry
// Description: Routing-key to handler bindings, sealed at startup.
// Purpose: Resolve contracts to local pipelines in constant time.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! Handlers are registered on a [`RegistryBuilder`] together with their
//! validation rules and authorization policies. Registration fails fast on
//! duplicate or malformed routing keys. [`RegistryBuilder::seal`] produces an
//! immutable [`HandlerRegistry`] that is cheap to clone and safe to share
//! across tasks; bindings cannot change after sealing.
//!
//! Each binding stores its pipeline twice: typed, for in-process dispatch
//! of the concrete contract type, and erased, for byte-level wire requests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::Command;
use crate::core::ContractDescriptor;
use crate::core::ContractKind;
use crate::core::Query;
use crate::core::RoutingKey;
use crate::core::RoutingKeyError;
use crate::interfaces::CommandHandler;
use crate::interfaces::Policy;
use crate::interfaces::QueryHandler;
use crate::runtime::authorization::PolicySet;
use crate::runtime::pipeline::CommandPipeline;
use crate::runtime::pipeline::ErasedPipeline;
use crate::runtime::pipeline::QueryPipeline;
use crate::runtime::validation::Rule;
use crate::runtime::validation::Validator;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Routing key already has a handler.
    #[error("duplicate binding for {routing_key}: already bound to {existing}, rejected {attempted}")]
    DuplicateBinding {
        /// Conflicting routing key.
        routing_key: String,
        /// Type already bound.
        existing: String,
        /// Type that attempted to bind.
        attempted: String,
    },
    /// No handler for the routing key.
    #[error("no handler bound for {0}")]
    UnboundContract(String),
    /// Routing key bound to a different contract type.
    #[error("{routing_key} is bound to {bound}, not {requested}")]
    ContractMismatch {
        /// Routing key requested.
        routing_key: String,
        /// Type bound at the key.
        bound: String,
        /// Type requested by the caller.
        requested: String,
    },
    /// Contract declares an invalid routing key.
    #[error(transparent)]
    InvalidRoutingKey(#[from] RoutingKeyError),
}

// ============================================================================
// SECTION: Handler Factory
// ============================================================================

/// Source of handler instances for a binding.
pub enum HandlerFactory<H: ?Sized> {
    /// One instance shared by every dispatch.
    Shared(Arc<H>),
    /// New instance per dispatch.
    Scoped(Arc<dyn Fn() -> Arc<H> + Send + Sync>),
}

impl<H: ?Sized> HandlerFactory<H> {
    /// Returns the handler for one dispatch.
    #[must_use]
    pub fn instance(&self) -> Arc<H> {
        match self {
            Self::Shared(handler) => Arc::clone(handler),
            Self::Scoped(factory) => factory(),
        }
    }
}

impl<H: ?Sized> Clone for HandlerFactory<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Shared(handler) => Self::Shared(Arc::clone(handler)),
            Self::Scoped(factory) => Self::Scoped(Arc::clone(factory)),
        }
    }
}

impl<H: ?Sized> fmt::Debug for HandlerFactory<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared(_) => f.write_str("HandlerFactory::Shared"),
            Self::Scoped(_) => f.write_str("HandlerFactory::Scoped"),
        }
    }
}

// ============================================================================
// SECTION: Bindings
// ============================================================================

/// Handler, rules, and policies for one command type.
pub struct CommandBinding<C: Command> {
    /// Handler source.
    handler: HandlerFactory<dyn CommandHandler<C>>,
    /// Validation rules.
    validator: Validator<C>,
    /// Authorization policies.
    policies: PolicySet,
}

impl<C: Command> CommandBinding<C> {
    /// Binds a shared handler instance.
    pub fn new(handler: impl CommandHandler<C> + 'static) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Binds an already shared handler.
    #[must_use]
    pub fn from_arc(handler: Arc<dyn CommandHandler<C>>) -> Self {
        Self {
            handler: HandlerFactory::Shared(handler),
            validator: Validator::new(),
            policies: PolicySet::new(),
        }
    }

    /// Binds a factory producing a handler per dispatch.
    pub fn scoped<H, F>(factory: F) -> Self
    where
        H: CommandHandler<C> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Arc<dyn Fn() -> Arc<dyn CommandHandler<C>> + Send + Sync> =
            Arc::new(move || Arc::new(factory()) as Arc<dyn CommandHandler<C>>);
        Self {
            handler: HandlerFactory::Scoped(factory),
            validator: Validator::new(),
            policies: PolicySet::new(),
        }
    }

    /// Adds a validation rule.
    #[must_use]
    pub fn rule(mut self, rule: impl Rule<C> + 'static) -> Self {
        self.validator = self.validator.rule(rule);
        self
    }

    /// Replaces the validator.
    #[must_use]
    pub fn validator(mut self, validator: Validator<C>) -> Self {
        self.validator = validator;
        self
    }

    /// Adds an authorization policy.
    #[must_use]
    pub fn policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }
}

/// Handler and policies for one query type. Queries carry no validation.
pub struct QueryBinding<Q: Query> {
    /// Handler source.
    handler: HandlerFactory<dyn QueryHandler<Q>>,
    /// Authorization policies.
    policies: PolicySet,
}

impl<Q: Query> QueryBinding<Q> {
    /// Binds a shared handler instance.
    pub fn new(handler: impl QueryHandler<Q> + 'static) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Binds an already shared handler.
    #[must_use]
    pub fn from_arc(handler: Arc<dyn QueryHandler<Q>>) -> Self {
        Self {
            handler: HandlerFactory::Shared(handler),
            policies: PolicySet::new(),
        }
    }

    /// Binds a factory producing a handler per dispatch.
    pub fn scoped<H, F>(factory: F) -> Self
    where
        H: QueryHandler<Q> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: Arc<dyn Fn() -> Arc<dyn QueryHandler<Q>> + Send + Sync> =
            Arc::new(move || Arc::new(factory()) as Arc<dyn QueryHandler<Q>>);
        Self {
            handler: HandlerFactory::Scoped(factory),
            policies: PolicySet::new(),
        }
    }

    /// Adds an authorization policy.
    #[must_use]
    pub fn policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }
}

/// Sealed binding stored in the registry.
#[derive(Clone)]
pub struct ContractBinding {
    /// Contract description.
    descriptor: ContractDescriptor,
    /// Concrete contract type.
    type_id: TypeId,
    /// Typed pipeline for in-process dispatch.
    typed: Arc<dyn Any + Send + Sync>,
    /// Byte-level pipeline for wire requests.
    erased: Arc<dyn ErasedPipeline>,
    /// Number of validation rules.
    rule_count: usize,
    /// Number of authorization policies.
    policy_count: usize,
}

impl ContractBinding {
    /// Routing key of the binding.
    #[must_use]
    pub const fn routing_key(&self) -> &RoutingKey {
        &self.descriptor.routing_key
    }

    /// Command or query.
    #[must_use]
    pub const fn kind(&self) -> ContractKind {
        self.descriptor.kind
    }

    /// Rust type name of the contract.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.descriptor.type_name
    }

    /// Full descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    /// Number of validation rules.
    #[must_use]
    pub const fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Number of authorization policies.
    #[must_use]
    pub const fn policy_count(&self) -> usize {
        self.policy_count
    }

    /// Byte-level pipeline.
    pub(crate) fn erased(&self) -> &dyn ErasedPipeline {
        self.erased.as_ref()
    }
}

impl fmt::Debug for ContractBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractBinding")
            .field("descriptor", &self.descriptor)
            .field("rule_count", &self.rule_count)
            .field("policy_count", &self.policy_count)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Mutable registration phase.
#[derive(Default)]
pub struct RegistryBuilder {
    /// Bindings registered so far.
    bindings: HashMap<RoutingKey, ContractBinding>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateBinding`] when the routing key is
    /// taken, or [`RegistryError::InvalidRoutingKey`] when it is malformed.
    pub fn register_command<C: Command>(
        &mut self,
        binding: CommandBinding<C>,
    ) -> Result<&mut Self, RegistryError> {
        let routing_key = RoutingKey::parse(C::ROUTING_KEY)?;
        self.ensure_free::<C>(&routing_key)?;
        let rule_count = binding.validator.len();
        let policy_count = binding.policies.len();
        let pipeline = Arc::new(CommandPipeline {
            routing_key: routing_key.clone(),
            handler: binding.handler,
            validator: binding.validator,
            policies: binding.policies,
        });
        let descriptor = ContractDescriptor::command::<C>();
        self.insert(routing_key, ContractBinding {
            descriptor,
            type_id: TypeId::of::<C>(),
            typed: Arc::clone(&pipeline) as Arc<dyn Any + Send + Sync>,
            erased: pipeline,
            rule_count,
            policy_count,
        });
        Ok(self)
    }

    /// Registers a query binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateBinding`] when the routing key is
    /// taken, or [`RegistryError::InvalidRoutingKey`] when it is malformed.
    pub fn register_query<Q: Query>(
        &mut self,
        binding: QueryBinding<Q>,
    ) -> Result<&mut Self, RegistryError> {
        let routing_key = RoutingKey::parse(Q::ROUTING_KEY)?;
        self.ensure_free::<Q>(&routing_key)?;
        let policy_count = binding.policies.len();
        let pipeline = Arc::new(QueryPipeline {
            routing_key: routing_key.clone(),
            handler: binding.handler,
            policies: binding.policies,
        });
        let descriptor = ContractDescriptor::query::<Q>();
        self.insert(routing_key, ContractBinding {
            descriptor,
            type_id: TypeId::of::<Q>(),
            typed: Arc::clone(&pipeline) as Arc<dyn Any + Send + Sync>,
            erased: pipeline,
            rule_count: 0,
            policy_count,
        });
        Ok(self)
    }

    /// Rejects a key that is already bound.
    fn ensure_free<T>(&self, routing_key: &RoutingKey) -> Result<(), RegistryError> {
        match self.bindings.get(routing_key) {
            Some(existing) => Err(RegistryError::DuplicateBinding {
                routing_key: routing_key.to_string(),
                existing: existing.type_name().to_string(),
                attempted: std::any::type_name::<T>().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Stores a validated binding.
    fn insert(&mut self, routing_key: RoutingKey, binding: ContractBinding) {
        tracing::debug!(
            routing_key = %routing_key,
            kind = %binding.kind(),
            contract = binding.type_name(),
            "contract bound"
        );
        self.bindings.insert(routing_key, binding);
    }

    /// Freezes the registry.
    #[must_use]
    pub fn seal(self) -> HandlerRegistry {
        tracing::info!(bindings = self.bindings.len(), "handler registry sealed");
        HandlerRegistry {
            bindings: Arc::new(self.bindings),
        }
    }
}

// ============================================================================
// SECTION: Sealed Registry
// ============================================================================

/// Immutable routing-key index of handler bindings.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    /// Sealed bindings.
    bindings: Arc<HashMap<RoutingKey, ContractBinding>>,
}

impl HandlerRegistry {
    /// Registry with no bindings.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts a new registration phase.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Looks up a binding.
    #[must_use]
    pub fn resolve(&self, routing_key: &str) -> Option<&ContractBinding> {
        self.bindings.get(routing_key)
    }

    /// Returns true when the key is bound.
    #[must_use]
    pub fn contains(&self, routing_key: &str) -> bool {
        self.bindings.contains_key(routing_key)
    }

    /// Looks up a binding or fails.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnboundContract`] when nothing is bound.
    pub fn ensure_bound(&self, routing_key: &str) -> Result<&ContractBinding, RegistryError> {
        self.resolve(routing_key).ok_or_else(|| RegistryError::UnboundContract(routing_key.to_string()))
    }

    /// Bound routing keys in sorted order.
    #[must_use]
    pub fn routing_keys(&self) -> Vec<&RoutingKey> {
        let mut keys: Vec<&RoutingKey> = self.bindings.keys().collect();
        keys.sort();
        keys
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Typed pipeline for a command.
    pub(crate) fn command<C: Command>(&self) -> Result<Arc<CommandPipeline<C>>, RegistryError> {
        let binding = self.ensure_bound(C::ROUTING_KEY)?;
        typed::<C, CommandPipeline<C>>(binding)
    }

    /// Typed pipeline for a query.
    pub(crate) fn query<Q: Query>(&self) -> Result<Arc<QueryPipeline<Q>>, RegistryError> {
        let binding = self.ensure_bound(Q::ROUTING_KEY)?;
        typed::<Q, QueryPipeline<Q>>(binding)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry").field("routing_keys", &self.routing_keys()).finish()
    }
}

/// Downcasts a binding to the pipeline of contract `T`.
fn typed<T: 'static, P: Send + Sync + 'static>(
    binding: &ContractBinding,
) -> Result<Arc<P>, RegistryError> {
    let mismatch = || RegistryError::ContractMismatch {
        routing_key: binding.routing_key().to_string(),
        bound: binding.type_name().to_string(),
        requested: std::any::type_name::<T>().to_string(),
    };
    if binding.type_id != TypeId::of::<T>() {
        return Err(mismatch());
    }
    Arc::clone(&binding.typed).downcast::<P>().map_err(|_| mismatch())
}
