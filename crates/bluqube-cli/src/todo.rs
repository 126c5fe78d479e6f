// crates/bluqube-cli/src/todo.rs
// ============================================================================
// Module: Todo Sample Domain
// Description: Todo contracts, in-memory repository, and handlers.
// Purpose: Give the CLI a complete domain to serve and dispatch.
// Dependencies: bluqube-core, async-trait, serde
// ============================================================================

//! ## Overview
//! Three contracts: `AddTodoCommand` (title must be non-empty, at most 200
//! characters), `CompleteTodoCommand` (requires the `editor` role), and
//! `GetTodosQuery`. Handlers share an [`InMemoryTodoRepository`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

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
use bluqube_core::RegistryError;
use bluqube_core::runtime::RequireRole;
use bluqube_core::runtime::validation::max_length;
use bluqube_core::runtime::validation::not_empty;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum todo title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Role required to complete a todo.
pub const EDITOR_ROLE: &str = "editor";

// ============================================================================
// SECTION: Contracts
// ============================================================================

/// A stored todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Repository-assigned identifier, starting at 1.
    pub id: u64,
    /// Title text.
    pub title: String,
    /// Completion flag.
    pub done: bool,
}

/// Adds a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTodoCommand {
    /// Title of the new todo.
    pub title: String,
}

impl Command for AddTodoCommand {
    const ROUTING_KEY: &'static str = "commands/addtodo";
}

/// Marks a todo done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTodoCommand {
    /// Identifier of the todo.
    pub id: u64,
}

impl Command for CompleteTodoCommand {
    const ROUTING_KEY: &'static str = "commands/completetodo";
}

/// Lists every todo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTodosQuery;

/// Result of [`GetTodosQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTodosResult {
    /// Todos in insertion order.
    pub todos: Vec<TodoItem>,
}

impl Query for GetTodosQuery {
    const ROUTING_KEY: &'static str = "queries/gettodos";
    type Output = GetTodosResult;
}

// ============================================================================
// SECTION: Repository
// ============================================================================

/// Process-local todo storage.
#[derive(Debug, Default)]
pub struct InMemoryTodoRepository {
    /// Stored items in insertion order.
    items: Mutex<Vec<TodoItem>>,
}

impl InMemoryTodoRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new todo and returns its identifier.
    pub fn add(&self, title: String) -> u64 {
        let mut items = self.lock();
        let id = items.last().map_or(1, |item| item.id + 1);
        items.push(TodoItem {
            id,
            title,
            done: false,
        });
        id
    }

    /// Marks `id` done; false when no such todo exists.
    pub fn complete(&self, id: u64) -> bool {
        let mut items = self.lock();
        match items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.done = true;
                true
            }
            None => false,
        }
    }

    /// Copies every stored todo.
    #[must_use]
    pub fn list(&self) -> Vec<TodoItem> {
        self.lock().clone()
    }

    /// Locks the item list, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, Vec<TodoItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles [`AddTodoCommand`].
struct AddTodoHandler {
    /// Backing store.
    repository: Arc<InMemoryTodoRepository>,
}

#[async_trait]
impl CommandHandler<AddTodoCommand> for AddTodoHandler {
    async fn handle(&self, command: AddTodoCommand, ctx: &HandlerContext) -> Result<(), HandlerError> {
        let id = self.repository.add(command.title);
        tracing::debug!(id, subject = ctx.caller.subject.as_deref().unwrap_or("anonymous"), "todo added");
        Ok(())
    }
}

/// Handles [`CompleteTodoCommand`].
struct CompleteTodoHandler {
    /// Backing store.
    repository: Arc<InMemoryTodoRepository>,
}

#[async_trait]
impl CommandHandler<CompleteTodoCommand> for CompleteTodoHandler {
    async fn handle(
        &self,
        command: CompleteTodoCommand,
        _ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        if self.repository.complete(command.id) {
            Ok(())
        } else {
            Err(HandlerError::Fault(format!("todo {} not found", command.id)))
        }
    }
}

/// Handles [`GetTodosQuery`].
struct GetTodosHandler {
    /// Backing store.
    repository: Arc<InMemoryTodoRepository>,
}

#[async_trait]
impl QueryHandler<GetTodosQuery> for GetTodosHandler {
    async fn handle(
        &self,
        _query: GetTodosQuery,
        _ctx: &HandlerContext,
    ) -> Result<GetTodosResult, HandlerError> {
        Ok(GetTodosResult {
            todos: self.repository.list(),
        })
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Binds the todo contracts over `repository`.
///
/// # Errors
///
/// Returns [`RegistryError`] if a binding is rejected.
pub fn todo_registry(repository: &Arc<InMemoryTodoRepository>) -> Result<HandlerRegistry, RegistryError> {
    let add = CommandBinding::new(AddTodoHandler {
        repository: Arc::clone(repository),
    })
    .rule(not_empty("Title", |command: &AddTodoCommand| command.title.as_str()))
    .rule(max_length("Title", MAX_TITLE_LENGTH, |command: &AddTodoCommand| command.title.as_str()));
    let complete = CommandBinding::new(CompleteTodoHandler {
        repository: Arc::clone(repository),
    })
    .policy(RequireRole::new(EDITOR_ROLE));
    let list = QueryBinding::new(GetTodosHandler {
        repository: Arc::clone(repository),
    });

    let mut builder = HandlerRegistry::builder();
    builder.register_command(add)?.register_command(complete)?.register_query(list)?;
    Ok(builder.seal())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
