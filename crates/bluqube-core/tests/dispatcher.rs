// crates/bluqube-core/tests/dispatcher.rs
// ============================================================================
// Module: Dispatcher Tests
// Description: Local dispatch, stage ordering, failures, and cancellation.
// Purpose: Ensure every dispatch ends in exactly one envelope variant.
// Dependencies: bluqube-core, tokio
// ============================================================================

//! Dispatcher behavior tests over the todo fixture domain.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bluqube_core::CallerContext;
use bluqube_core::CancelSignal;
use bluqube_core::DispatchContext;
use bluqube_core::Dispatcher;
use bluqube_core::ExecutionMode;
use bluqube_core::FailureCode;
use bluqube_core::ResultEnvelope;
use bluqube_core::runtime::MemoryAuditSink;
use common::AddTodoCommand;
use common::AuditTodosQuery;
use common::CompleteTodoCommand;
use common::DotSegmentCommand;
use common::FailingCommand;
use common::GetTodosQuery;
use common::GetTodosResult;
use common::PanickingCommand;
use common::RenameTodoCommand;
use common::SlowCommand;
use common::SlowCounters;
use common::TodoItem;
use common::TodoStore;
use common::UnboundCommand;
use common::guarded_registry;
use common::todo_registry;

fn build_dispatcher(store: &Arc<TodoStore>) -> (Dispatcher, SlowCounters) {
    let counters = SlowCounters::default();
    (Dispatcher::new(todo_registry(store, &counters)), counters)
}

fn guarded_dispatcher(store: &Arc<TodoStore>) -> (Dispatcher, Arc<AtomicUsize>) {
    let invocations = Arc::new(AtomicUsize::new(0));
    (Dispatcher::new(guarded_registry(store, &invocations)), invocations)
}

fn editor() -> DispatchContext {
    DispatchContext::new(CallerContext::authenticated("bob").with_role("editor"))
}

fn item(id: u64, title: &str) -> TodoItem {
    TodoItem {
        id,
        title: title.to_string(),
        done: false,
    }
}

#[tokio::test]
async fn add_todo_succeeds_and_mutates_state() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, _) = build_dispatcher(&store);
    let result = dispatcher
        .send(
            AddTodoCommand {
                title: "Buy milk".to_string(),
            },
            &DispatchContext::anonymous(),
        )
        .await;
    assert_eq!(result, ResultEnvelope::Succeeded(()));
    assert_eq!(store.snapshot(), vec![item(1, "Buy milk")]);
}

#[tokio::test]
async fn empty_title_is_rejected_before_the_handler_runs() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, _) = build_dispatcher(&store);
    let result = dispatcher
        .send(
            AddTodoCommand {
                title: String::new(),
            },
            &DispatchContext::anonymous(),
        )
        .await;
    match result {
        ResultEnvelope::ValidationFailed(outcome) => {
            assert_eq!(outcome.pairs(), vec![("Title", "must not be empty")]);
        }
        other => panic!("unexpected envelope: {other:?}"),
    }
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn get_todos_returns_stored_items() {
    let store = TodoStore::seeded(&["item1", "item2"]);
    let (dispatcher, _) = build_dispatcher(&store);
    let result = dispatcher.query(GetTodosQuery, &DispatchContext::anonymous()).await;
    assert_eq!(
        result,
        ResultEnvelope::Succeeded(GetTodosResult {
            todos: vec![item(1, "item1"), item(2, "item2")],
        })
    );
}

#[tokio::test]
async fn unbound_contract_without_remote_fails() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, _) = build_dispatcher(&store);
    assert_eq!(dispatcher.execution_mode("commands/unbound"), ExecutionMode::Unroutable);
    let result = dispatcher
        .send(
            UnboundCommand {
                note: "x".to_string(),
            },
            &DispatchContext::anonymous(),
        )
        .await;
    assert_eq!(result.failure_code(), Some(FailureCode::UnboundContract));
}

#[tokio::test]
async fn role_policy_denies_without_running_handler() {
    let store = TodoStore::seeded(&["item1"]);
    let (dispatcher, _) = build_dispatcher(&store);

    let anonymous = dispatcher.send(CompleteTodoCommand { id: 1 }, &DispatchContext::anonymous()).await;
    assert_eq!(anonymous, ResultEnvelope::Unauthorized("unauthenticated".to_string()));

    let reader = DispatchContext::new(CallerContext::authenticated("alice").with_role("reader"));
    let denied = dispatcher.send(CompleteTodoCommand { id: 1 }, &reader).await;
    assert_eq!(denied, ResultEnvelope::Unauthorized("missing_role".to_string()));
    assert!(!store.snapshot()[0].done);

    let editor = DispatchContext::new(CallerContext::authenticated("bob").with_role("editor"));
    let allowed = dispatcher.send(CompleteTodoCommand { id: 1 }, &editor).await;
    assert_eq!(allowed, ResultEnvelope::Succeeded(()));
    assert!(store.snapshot()[0].done);
}

#[tokio::test]
async fn send_reports_every_failing_rule_without_invoking_handler() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, invocations) = guarded_dispatcher(&store);
    let command = RenameTodoCommand {
        id: 0,
        title: String::new(),
    };
    match dispatcher.send(command, &editor()).await {
        ResultEnvelope::ValidationFailed(outcome) => {
            assert_eq!(outcome.pairs(), vec![
                ("Id", "Id must be positive"),
                ("Title", "must not be empty"),
            ]);
        }
        other => panic!("unexpected envelope: {other:?}"),
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn validation_runs_before_authorization() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, invocations) = guarded_dispatcher(&store);

    let invalid = RenameTodoCommand {
        id: 1,
        title: String::new(),
    };
    let result = dispatcher.send(invalid, &DispatchContext::anonymous()).await;
    assert!(
        matches!(result, ResultEnvelope::ValidationFailed(_)),
        "invalid command from an unauthorized caller must fail validation: {result:?}"
    );

    let valid = RenameTodoCommand {
        id: 1,
        title: "Buy oat milk".to_string(),
    };
    let denied = dispatcher.send(valid.clone(), &DispatchContext::anonymous()).await;
    assert_eq!(denied, ResultEnvelope::Unauthorized("unauthenticated".to_string()));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    assert_eq!(dispatcher.send(valid, &editor()).await, ResultEnvelope::Succeeded(()));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn query_policy_denies_without_running_handler() {
    let store = TodoStore::seeded(&["item1"]);
    let (dispatcher, invocations) = guarded_dispatcher(&store);

    let anonymous = dispatcher.query(AuditTodosQuery, &DispatchContext::anonymous()).await;
    assert_eq!(anonymous, ResultEnvelope::Unauthorized("unauthenticated".to_string()));
    let reader = DispatchContext::new(CallerContext::authenticated("alice").with_role("reader"));
    let denied = dispatcher.query(AuditTodosQuery, &reader).await;
    assert_eq!(denied, ResultEnvelope::Unauthorized("missing_role".to_string()));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    let auditor = DispatchContext::new(CallerContext::authenticated("carol").with_role("auditor"));
    let allowed = dispatcher.query(AuditTodosQuery, &auditor).await;
    assert_eq!(
        allowed,
        ResultEnvelope::Succeeded(GetTodosResult {
            todos: vec![item(1, "item1")],
        })
    );
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dot_segment_routing_key_is_never_dispatched() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, _) = build_dispatcher(&store);
    let result = dispatcher
        .send(
            DotSegmentCommand {
                title: "smuggled".to_string(),
            },
            &DispatchContext::anonymous(),
        )
        .await;
    assert_eq!(result.failure_code(), Some(FailureCode::UnboundContract));
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn handler_fault_is_opaque_to_the_caller() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, _) = build_dispatcher(&store);
    let result = dispatcher.send(FailingCommand, &DispatchContext::anonymous()).await;
    match result {
        ResultEnvelope::Failed(failure) => {
            assert_eq!(failure.code, FailureCode::HandlerFault);
            assert!(!failure.message.contains("hunter2"));
        }
        other => panic!("unexpected envelope: {other:?}"),
    }
}

#[tokio::test]
async fn handler_panic_becomes_handler_fault() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, _) = build_dispatcher(&store);
    let result = dispatcher.send(PanickingCommand, &DispatchContext::anonymous()).await;
    assert_eq!(result.failure_code(), Some(FailureCode::HandlerFault));
}

#[tokio::test]
async fn pre_cancelled_dispatch_never_reaches_handler() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, counters) = build_dispatcher(&store);
    let cancel = CancelSignal::new();
    cancel.cancel();
    let ctx = DispatchContext::anonymous().with_cancel(cancel);
    let result = dispatcher.send(SlowCommand { millis: 10 }, &ctx).await;
    assert_eq!(result.failure_code(), Some(FailureCode::Cancelled));
    assert_eq!(counters.started.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_running_handler() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, counters) = build_dispatcher(&store);
    let cancel = CancelSignal::new();
    let ctx = DispatchContext::anonymous().with_cancel(cancel.clone());
    cancel.cancel_after(Duration::from_millis(50));

    let result = dispatcher.send(SlowCommand { millis: 10_000 }, &ctx).await;
    assert_eq!(result.failure_code(), Some(FailureCode::Cancelled));
    assert_eq!(counters.started.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(counters.completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_dispatches_do_not_interfere() {
    let store = TodoStore::seeded(&[]);
    let (dispatcher, _) = build_dispatcher(&store);
    let dispatcher = Arc::new(dispatcher);
    let mut tasks = Vec::new();
    for index in 0 .. 16 {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.push(tokio::spawn(async move {
            let command = AddTodoCommand {
                title: format!("todo {index}"),
            };
            dispatcher.send(command, &DispatchContext::anonymous()).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_succeeded());
    }
    assert_eq!(store.snapshot().len(), 16);
}

#[tokio::test]
async fn every_dispatch_is_audited() {
    let store = TodoStore::seeded(&[]);
    let audit = Arc::new(MemoryAuditSink::new());
    let (dispatcher, _) = build_dispatcher(&store);
    let dispatcher = dispatcher.with_audit(Arc::clone(&audit) as _);

    let ctx = DispatchContext::new(CallerContext::authenticated("alice"));
    dispatcher
        .send(
            AddTodoCommand {
                title: String::new(),
            },
            &ctx,
        )
        .await;
    dispatcher.query(GetTodosQuery, &ctx).await;
    dispatcher
        .send(
            UnboundCommand {
                note: String::new(),
            },
            &ctx,
        )
        .await;

    let events = audit.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].status, "validation_failed");
    assert_eq!(events[0].subject.as_deref(), Some("alice"));
    assert_eq!(events[1].status, "succeeded");
    assert_eq!(events[1].mode, ExecutionMode::Local);
    assert_eq!(events[2].mode, ExecutionMode::Unroutable);
    assert_eq!(events[2].failure_code, Some(FailureCode::UnboundContract));
}
