// crates/bluqube-http/tests/common/mod.rs
// ============================================================================
// Module: HTTP Test Fixtures
// Description: Todo contracts and a loopback-bound HTTP server for tests.
// Purpose: Exercise the HTTP endpoint and transport over real sockets.
// Dependencies: bluqube-core, bluqube-config, bluqube-http, tokio
// ============================================================================

//! ## Overview
//! Spawns an [`HttpEndpoint`] on `127.0.0.1:0` over a small todo registry and
//! returns the base URL for [`HttpTransport`] clients.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(clippy::unwrap_used, reason = "Fixtures unwrap on setup and poisoned locks.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use bluqube_config::PrincipalConfig;
use bluqube_config::ServerConfig;
use bluqube_core::Command;
use bluqube_core::CommandBinding;
use bluqube_core::CommandHandler;
use bluqube_core::HandlerContext;
use bluqube_core::HandlerError;
use bluqube_core::HandlerRegistry;
use bluqube_core::Query;
use bluqube_core::QueryBinding;
use bluqube_core::QueryHandler;
use bluqube_core::WireEndpoint;
use bluqube_core::runtime::RequireRole;
use bluqube_core::runtime::validation::not_empty;
use bluqube_http::HttpEndpoint;
use bluqube_http::HttpTransport;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use url::Url;

// ============================================================================
// SECTION: Contracts
// ============================================================================

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

/// Command whose handler sleeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowCommand {
    pub millis: u64,
}

impl Command for SlowCommand {
    const ROUTING_KEY: &'static str = "commands/slow";
}

/// Command bound nowhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnboundCommand {
    pub note: String,
}

impl Command for UnboundCommand {
    const ROUTING_KEY: &'static str = "commands/unbound";
}

/// Client-side contract whose key resolves onto `commands/addtodo` in a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotSegmentCommand {
    pub title: String,
}

impl Command for DotSegmentCommand {
    const ROUTING_KEY: &'static str = "commands/admin/../addtodo";
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

#[derive(Debug, Default)]
pub struct TodoStore {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoStore {
    pub fn seeded(titles: &[&str]) -> Arc<Self> {
        let store = Self::default();
        {
            let mut items = store.items.lock().unwrap();
            for title in titles {
                let id = items.len() as u64 + 1;
                items.push(TodoItem {
                    id,
                    title: (*title).to_string(),
                    done: false,
                });
            }
        }
        Arc::new(store)
    }

    pub fn snapshot(&self) -> Vec<TodoItem> {
        self.items.lock().unwrap().clone()
    }
}

struct AddTodoHandler {
    store: Arc<TodoStore>,
}

#[async_trait]
impl CommandHandler<AddTodoCommand> for AddTodoHandler {
    async fn handle(&self, command: AddTodoCommand, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        let mut items = self.store.items.lock().unwrap();
        let id = items.len() as u64 + 1;
        items.push(TodoItem {
            id,
            title: command.title,
            done: false,
        });
        Ok(())
    }
}

struct CompleteTodoHandler {
    store: Arc<TodoStore>,
}

#[async_trait]
impl CommandHandler<CompleteTodoCommand> for CompleteTodoHandler {
    async fn handle(
        &self,
        command: CompleteTodoCommand,
        _ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let mut items = self.store.items.lock().unwrap();
        let item = items
            .iter_mut()
            .find(|item| item.id == command.id)
            .ok_or_else(|| HandlerError::fault("todo not found"))?;
        item.done = true;
        Ok(())
    }
}

struct GetTodosHandler {
    store: Arc<TodoStore>,
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

/// Counts starts and completions around a sleep.
#[derive(Debug, Clone, Default)]
pub struct SlowCounters {
    pub started: Arc<AtomicUsize>,
    pub completed: Arc<AtomicUsize>,
}

struct SlowHandler {
    counters: SlowCounters,
}

#[async_trait]
impl CommandHandler<SlowCommand> for SlowHandler {
    async fn handle(&self, command: SlowCommand, _ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(command.millis)).await;
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Registry over `store`; completing a todo requires the `editor` role.
pub fn todo_registry(store: &Arc<TodoStore>, counters: &SlowCounters) -> HandlerRegistry {
    let mut builder = HandlerRegistry::builder();
    builder
        .register_command(
            CommandBinding::new(AddTodoHandler {
                store: Arc::clone(store),
            })
            .rule(not_empty("Title", |command: &AddTodoCommand| command.title.as_str())),
        )
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
            counters: counters.clone(),
        }))
        .unwrap();
    builder.seal()
}

/// Server config with one `editor` principal.
pub fn server_config(allow_anonymous: bool) -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        allow_anonymous,
        max_body_bytes: 4096,
        principals: vec![PrincipalConfig {
            token: "editor-token".to_string(),
            subject: "alice".to_string(),
            roles: vec!["editor".to_string()],
            claims: std::collections::BTreeMap::new(),
        }],
        ..ServerConfig::default()
    }
}

/// Running test server.
pub struct TestServer {
    pub base_url: Url,
    pub store: Arc<TodoStore>,
    pub counters: SlowCounters,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Transport pointed at this server.
    pub fn transport(&self, bearer_token: Option<&str>) -> HttpTransport {
        HttpTransport::new(self.base_url.clone(), Duration::from_secs(5), bearer_token, 1024 * 1024)
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns a server on an ephemeral loopback port.
pub async fn spawn_server(config: ServerConfig, seed: &[&str]) -> TestServer {
    let store = TodoStore::seeded(seed);
    let counters = SlowCounters::default();
    let endpoint = WireEndpoint::new(todo_registry(&store, &counters));
    let http = HttpEndpoint::new(endpoint, &config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let _ = http.serve_listener(listener).await;
    });
    let base_url = Url::parse(&format!("http://{addr}{}", config.base_path)).unwrap();
    TestServer {
        base_url,
        store,
        counters,
        task,
    }
}
