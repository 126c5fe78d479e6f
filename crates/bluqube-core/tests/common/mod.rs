// crates/bluqube-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Todo contracts, handlers, and registries shared by core tests.
// Purpose: Provide a small deterministic domain for dispatch tests.
// Dependencies: bluqube-core, async-trait, serde, tokio
// ============================================================================

//! ## Overview
//! A minimal todo domain: one command that adds an item, one that completes
//! it behind a role policy, and one query that lists items. Extra contracts
//! exercise slow, failing, and panicking handlers, plus a guarded registry
//! whose bindings carry both rules and role policies.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    reason = "Fixtures panic on poisoned locks and in the panicking handler."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use bluqube_core::Command;
use bluqube_core::CommandBinding;
use bluqube_core::CommandHandler;
use bluqube_core::HandlerContext;
use bluqube_core::HandlerError;
use bluqube_core::HandlerRegistry;
use bluqube_core::Query;
use bluqube_core::QueryBinding;
use bluqube_core::QueryHandler;
use bluqube_core::runtime::FieldRule;
use bluqube_core::runtime::RequireRole;
use bluqube_core::runtime::validation::max_length;
use bluqube_core::runtime::validation::not_empty;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Contracts
// ============================================================================

/// Todo item as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub title: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTodoCommand {
    pub title: String,
}

impl Command for AddTodoCommand {
    const ROUTING_KEY: &'static str = "commands/addtodo";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTodoCommand {
    pub id: u64,
}

impl Command for CompleteTodoCommand {
    const ROUTING_KEY: &'static str = "commands/completetodo";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetTodosQuery;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTodosResult {
    pub todos: Vec<TodoItem>,
}

impl Query for GetTodosQuery {
    const ROUTING_KEY: &'static str = "queries/gettodos";
    type Output = GetTodosResult;
}

/// Command whose handler sleeps before completing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowCommand {
    pub millis: u64,
}

impl Command for SlowCommand {
    const ROUTING_KEY: &'static str = "commands/slow";
}

/// Command whose handler always faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailingCommand;

impl Command for FailingCommand {
    const ROUTING_KEY: &'static str = "commands/failing";
}

/// Command whose handler panics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanickingCommand;

impl Command for PanickingCommand {
    const ROUTING_KEY: &'static str = "commands/panicking";
}

/// Command never bound in the fixture registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnboundCommand {
    pub note: String,
}

impl Command for UnboundCommand {
    const ROUTING_KEY: &'static str = "commands/unbound";
}

/// Command whose key would resolve onto `commands/addtodo` as a URL path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotSegmentCommand {
    pub title: String,
}

impl Command for DotSegmentCommand {
    const ROUTING_KEY: &'static str = "commands/admin/../addtodo";
}

/// Command guarded by both validation rules and an `editor` policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameTodoCommand {
    pub id: u64,
    pub title: String,
}

impl Command for RenameTodoCommand {
    const ROUTING_KEY: &'static str = "commands/renametodo";
}

/// Query guarded by an `auditor` policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditTodosQuery;

impl Query for AuditTodosQuery {
    const ROUTING_KEY: &'static str = "queries/audittodos";
    type Output = GetTodosResult;
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Shared in-memory todo list.
#[derive(Debug, Default)]
pub struct TodoStore {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoStore {
    pub fn seeded(titles: &[&str]) -> Arc<Self> {
        let store = Self::default();
        for title in titles {
            store.add(title);
        }
        Arc::new(store)
    }

    pub fn add(&self, title: &str) -> u64 {
        let mut items = self.items.lock().unwrap();
        let id = items.len() as u64 + 1;
        items.push(TodoItem {
            id,
            title: title.to_string(),
            done: false,
        });
        id
    }

    pub fn complete(&self, id: u64) -> bool {
        let mut items = self.items.lock().unwrap();
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.done = true;
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<TodoItem> {
        self.items.lock().unwrap().clone()
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

pub struct AddTodoHandler {
    pub store: Arc<TodoStore>,
}

#[async_trait]
impl CommandHandler<AddTodoCommand> for AddTodoHandler {
    async fn handle(&self, command: AddTodoCommand, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.store.add(&command.title);
        Ok(())
    }
}

pub struct CompleteTodoHandler {
    pub store: Arc<TodoStore>,
}

#[async_trait]
impl CommandHandler<CompleteTodoCommand> for CompleteTodoHandler {
    async fn handle(
        &self,
        command: CompleteTodoCommand,
        _ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        if self.store.complete(command.id) {
            Ok(())
        } else {
            Err(HandlerError::Fault(format!("todo {} not found", command.id)))
        }
    }
}

pub struct GetTodosHandler {
    pub store: Arc<TodoStore>,
}

#[async_trait]
impl QueryHandler<GetTodosQuery> for GetTodosHandler {
    async fn handle(
        &self,
        _query: GetTodosQuery,
        _ctx: &HandlerContext,
    ) -> Result<GetTodosResult, HandlerError> {
        Ok(GetTodosResult {
            todos: self.store.snapshot(),
        })
    }
}

/// Sleeps, then bumps `completed`.
pub struct SlowHandler {
    pub started: Arc<AtomicUsize>,
    pub completed: Arc<AtomicUsize>,
}

#[async_trait]
impl CommandHandler<SlowCommand> for SlowHandler {
    async fn handle(&self, command: SlowCommand, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(command.millis)).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Counts invocations of the guarded handlers.
pub struct RenameTodoHandler {
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl CommandHandler<RenameTodoCommand> for RenameTodoHandler {
    async fn handle(
        &self,
        _command: RenameTodoCommand,
        _ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct AuditTodosHandler {
    pub store: Arc<TodoStore>,
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl QueryHandler<AuditTodosQuery> for AuditTodosHandler {
    async fn handle(
        &self,
        _query: AuditTodosQuery,
        _ctx: &HandlerContext,
    ) -> Result<GetTodosResult, HandlerError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(GetTodosResult {
            todos: self.store.snapshot(),
        })
    }
}

pub struct FailingHandler;

#[async_trait]
impl CommandHandler<FailingCommand> for FailingHandler {
    async fn handle(&self, _command: FailingCommand, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        Err(HandlerError::Fault("database password=hunter2 rejected".to_string()))
    }
}

pub struct PanickingHandler;

#[async_trait]
impl CommandHandler<PanickingCommand> for PanickingHandler {
    async fn handle(
        &self,
        _command: PanickingCommand,
        _ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        panic!("handler exploded");
    }
}

// ============================================================================
// SECTION: Registries
// ============================================================================

/// Counters observed by the slow handler.
#[derive(Debug, Clone, Default)]
pub struct SlowCounters {
    pub started: Arc<AtomicUsize>,
    pub completed: Arc<AtomicUsize>,
}

/// Add-todo binding with the standard title rules.
pub fn add_todo_binding(store: Arc<TodoStore>) -> CommandBinding<AddTodoCommand> {
    CommandBinding::new(AddTodoHandler {
        store,
    })
    .rule(not_empty("Title", |command: &AddTodoCommand| command.title.as_str()))
    .rule(max_length("Title", 200, |command: &AddTodoCommand| command.title.as_str()))
}

/// Registry binding every todo contract plus the slow/failing/panicking fixtures.
pub fn todo_registry(store: &Arc<TodoStore>, counters: &SlowCounters) -> HandlerRegistry {
    let mut builder = HandlerRegistry::builder();
    builder
        .register_command(add_todo_binding(Arc::clone(store)))
        .unwrap()
        .register_command(
            CommandBinding::new(CompleteTodoHandler {
                store: Arc::clone(store),
            })
            .policy(RequireRole::new("editor")),
        )
        .unwrap()
        .register_query(QueryBinding::new(GetTodosHandler {
            store: Arc::clone(store),
        }))
        .unwrap()
        .register_command(CommandBinding::new(SlowHandler {
            started: Arc::clone(&counters.started),
            completed: Arc::clone(&counters.completed),
        }))
        .unwrap()
        .register_command(CommandBinding::new(FailingHandler))
        .unwrap()
        .register_command(CommandBinding::new(PanickingHandler))
        .unwrap();
    builder.seal()
}

/// Registry whose bindings carry both rules and policies; every handler
/// invocation bumps `invocations`.
pub fn guarded_registry(store: &Arc<TodoStore>, invocations: &Arc<AtomicUsize>) -> HandlerRegistry {
    let mut builder = HandlerRegistry::builder();
    builder
        .register_command(
            CommandBinding::new(RenameTodoHandler {
                invocations: Arc::clone(invocations),
            })
            .rule(FieldRule::new("Id", "{field} must be positive", |c: &RenameTodoCommand| c.id > 0))
            .rule(not_empty("Title", |c: &RenameTodoCommand| c.title.as_str()))
            .rule(max_length("Title", 200, |c: &RenameTodoCommand| c.title.as_str()))
            .policy(RequireRole::new("editor")),
        )
        .unwrap()
        .register_query(
            QueryBinding::new(AuditTodosHandler {
                store: Arc::clone(store),
                invocations: Arc::clone(invocations),
            })
            .policy(RequireRole::new("auditor")),
        )
        .unwrap();
    builder.seal()
}
