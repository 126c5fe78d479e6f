// crates/bluqube-core/src/runtime/pipeline.rs
// ============================================================================
// Module: BluQube Execution Pipelines
// Description: Validate, authorize, and execute a single bound contract.
// Purpose: Run the local stages in a fixed order with cancellation at each step.
// Dependencies: async-trait, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! A pipeline is built per registered contract and runs the local stages:
//!
//! 1. cancellation check
//! 2. validation (commands only; all rules run)
//! 3. authorization (policies ANDed)
//! 4. handler execution on a spawned task
//!
//! Validation runs before authorization. Validation is pure over the
//! payload, while policies only see the caller and routing key.
//!
//! Handler tasks are aborted when the caller cancels or drops the dispatch
//! future. Handler faults and panics are logged here and surface as an
//! opaque [`crate::core::FailureCode::HandlerFault`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::core::CallerContext;
use crate::core::CancelSignal;
use crate::core::Command;
use crate::core::CommandResult;
use crate::core::Failure;
use crate::core::Query;
use crate::core::QueryResult;
use crate::core::ResultEnvelope;
use crate::core::RoutingKey;
use crate::interfaces::CommandHandler;
use crate::interfaces::HandlerContext;
use crate::interfaces::HandlerError;
use crate::interfaces::QueryHandler;
use crate::runtime::authorization::PolicySet;
use crate::runtime::codec;
use crate::runtime::registry::HandlerFactory;
use crate::runtime::validation::Validator;

// ============================================================================
// SECTION: Erased Pipeline
// ============================================================================

/// Byte-level entry point used by wire endpoints.
#[async_trait]
pub(crate) trait ErasedPipeline: Send + Sync {
    /// Decodes `body`, runs the pipeline, and returns a JSON-valued envelope.
    async fn run_wire(
        &self,
        body: &[u8],
        caller: Arc<CallerContext>,
        cancel: &CancelSignal,
    ) -> ResultEnvelope<Value>;
}

// ============================================================================
// SECTION: Command Pipeline
// ============================================================================

/// Stages bound to one command type.
pub(crate) struct CommandPipeline<C: Command> {
    /// Routing key of the command.
    pub(crate) routing_key: RoutingKey,
    /// Handler instance source.
    pub(crate) handler: HandlerFactory<dyn CommandHandler<C>>,
    /// Validation rules.
    pub(crate) validator: Validator<C>,
    /// Authorization policies.
    pub(crate) policies: PolicySet,
}

impl<C: Command> CommandPipeline<C> {
    /// Runs validation, authorization, and the handler.
    pub(crate) async fn run(
        &self,
        command: C,
        caller: Arc<CallerContext>,
        cancel: &CancelSignal,
    ) -> CommandResult {
        if cancel.is_cancelled() {
            return ResultEnvelope::Failed(Failure::cancelled());
        }
        let outcome = self.validator.validate(&command);
        if !outcome.is_valid() {
            tracing::debug!(
                routing_key = %self.routing_key,
                failures = outcome.len(),
                "command validation failed"
            );
            return ResultEnvelope::ValidationFailed(outcome);
        }
        if let Some(denied) = authorize(&self.policies, &caller, &self.routing_key, cancel).await {
            return denied;
        }
        let handler = self.handler.instance();
        let ctx = handler_context(&self.routing_key, caller, cancel);
        execute(&self.routing_key, cancel, async move { handler.handle(command, &ctx).await })
            .await
    }
}

#[async_trait]
impl<C: Command> ErasedPipeline for CommandPipeline<C> {
    async fn run_wire(
        &self,
        body: &[u8],
        caller: Arc<CallerContext>,
        cancel: &CancelSignal,
    ) -> ResultEnvelope<Value> {
        let command = match codec::decode_contract::<C>(body) {
            Ok(command) => command,
            Err(err) => {
                tracing::debug!(routing_key = %self.routing_key, error = %err, "malformed command");
                return ResultEnvelope::Failed(Failure::malformed_payload(&self.routing_key));
            }
        };
        self.run(command, caller, cancel).await.map(|()| Value::Null)
    }
}

// ============================================================================
// SECTION: Query Pipeline
// ============================================================================

/// Stages bound to one query type.
pub(crate) struct QueryPipeline<Q: Query> {
    /// Routing key of the query.
    pub(crate) routing_key: RoutingKey,
    /// Handler instance source.
    pub(crate) handler: HandlerFactory<dyn QueryHandler<Q>>,
    /// Authorization policies.
    pub(crate) policies: PolicySet,
}

impl<Q: Query> QueryPipeline<Q> {
    /// Runs authorization and the handler; queries skip validation.
    pub(crate) async fn run(
        &self,
        query: Q,
        caller: Arc<CallerContext>,
        cancel: &CancelSignal,
    ) -> QueryResult<Q> {
        if cancel.is_cancelled() {
            return ResultEnvelope::Failed(Failure::cancelled());
        }
        if let Some(denied) = authorize(&self.policies, &caller, &self.routing_key, cancel).await {
            return denied;
        }
        let handler = self.handler.instance();
        let ctx = handler_context(&self.routing_key, caller, cancel);
        execute(&self.routing_key, cancel, async move { handler.handle(query, &ctx).await }).await
    }
}

#[async_trait]
impl<Q: Query> ErasedPipeline for QueryPipeline<Q> {
    async fn run_wire(
        &self,
        body: &[u8],
        caller: Arc<CallerContext>,
        cancel: &CancelSignal,
    ) -> ResultEnvelope<Value> {
        let query = match codec::decode_contract::<Q>(body) {
            Ok(query) => query,
            Err(err) => {
                tracing::debug!(routing_key = %self.routing_key, error = %err, "malformed query");
                return ResultEnvelope::Failed(Failure::malformed_payload(&self.routing_key));
            }
        };
        match self.run(query, caller, cancel).await {
            ResultEnvelope::Succeeded(output) => match serde_json::to_value(&output) {
                Ok(value) => ResultEnvelope::Succeeded(value),
                Err(err) => {
                    tracing::error!(
                        routing_key = %self.routing_key,
                        error = %err,
                        "query output encode failed"
                    );
                    ResultEnvelope::Failed(Failure::transport())
                }
            },
            ResultEnvelope::ValidationFailed(outcome) => ResultEnvelope::ValidationFailed(outcome),
            ResultEnvelope::Unauthorized(reason) => ResultEnvelope::Unauthorized(reason),
            ResultEnvelope::Failed(failure) => ResultEnvelope::Failed(failure),
        }
    }
}

// ============================================================================
// SECTION: Shared Stages
// ============================================================================

/// Builds the handler context for one execution.
fn handler_context(
    routing_key: &RoutingKey,
    caller: Arc<CallerContext>,
    cancel: &CancelSignal,
) -> HandlerContext {
    HandlerContext {
        routing_key: routing_key.clone(),
        caller,
        cancel: cancel.clone(),
    }
}

/// Evaluates policies, racing cancellation. Returns the terminal envelope on denial.
async fn authorize<T>(
    policies: &PolicySet,
    caller: &CallerContext,
    routing_key: &RoutingKey,
    cancel: &CancelSignal,
) -> Option<ResultEnvelope<T>> {
    if policies.is_empty() {
        return None;
    }
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Some(ResultEnvelope::Failed(Failure::cancelled())),
        outcome = policies.authorize(caller, routing_key) => outcome,
    };
    if outcome.allowed {
        None
    } else {
        Some(ResultEnvelope::Unauthorized(outcome.reason_code().to_string()))
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs the handler on its own task and maps its outcome.
async fn execute<T, F>(routing_key: &RoutingKey, cancel: &CancelSignal, work: F) -> ResultEnvelope<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, HandlerError>> + Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(work));
    let joined = tokio::select! {
        biased;
        joined = &mut task.0 => joined,
        () = cancel.cancelled() => {
            tracing::debug!(routing_key = %routing_key, "handler cancelled");
            return ResultEnvelope::Failed(Failure::cancelled());
        }
    };
    match joined {
        Ok(Ok(value)) => ResultEnvelope::Succeeded(value),
        Ok(Err(HandlerError::Cancelled)) => ResultEnvelope::Failed(Failure::cancelled()),
        Ok(Err(HandlerError::Fault(message))) => {
            tracing::error!(routing_key = %routing_key, error = %message, "handler fault");
            ResultEnvelope::Failed(Failure::handler_fault())
        }
        Err(err) if err.is_panic() => {
            tracing::error!(routing_key = %routing_key, "handler panicked");
            ResultEnvelope::Failed(Failure::handler_fault())
        }
        Err(_) => ResultEnvelope::Failed(Failure::cancelled()),
    }
}
