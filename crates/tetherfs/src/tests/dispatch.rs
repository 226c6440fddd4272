//! Tests for the worker pool, dispatcher and completion delivery.

use crate::context::ContextRegistry;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};

#[tokio::test]
async fn test_result_is_delivered() {
    let dispatcher = Dispatcher::new(2);
    let cx = dispatcher.register_context();
    let value = dispatcher
        .run_with_result(&cx, || Ok(41 + 1))
        .await
        .unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_void_operation_completes() {
    let dispatcher = Dispatcher::new(1);
    let cx = dispatcher.register_context();
    dispatcher.run_void(&cx, || Ok(())).await.unwrap();
}

#[tokio::test]
async fn test_domain_error_travels_through_completion() {
    let dispatcher = Dispatcher::new(1);
    let cx = dispatcher.register_context();
    let result: Result<()> = dispatcher
        .run_void(&cx, || Err(Error::invalid_argument("nope")))
        .await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn test_operation_never_runs_inline() {
    let dispatcher = Dispatcher::new(1);
    let cx = dispatcher.register_context();
    let worker_name = dispatcher
        .run_with_result(&cx, || {
            Ok(std::thread::current()
                .name()
                .unwrap_or_default()
                .to_string())
        })
        .await
        .unwrap();
    assert!(
        worker_name.starts_with("tetherfs-worker-"),
        "operation ran on {worker_name:?}"
    );
}

#[tokio::test]
async fn test_panicking_operation_becomes_fault() {
    let dispatcher = Dispatcher::new(1);
    let cx = dispatcher.register_context();
    let result: Result<()> = dispatcher.run_void(&cx, || panic!("boom")).await;
    match result {
        Err(Error::Fault(msg)) => assert!(msg.contains("boom")),
        other => panic!("expected Fault, got {other:?}"),
    }
    // The single worker survived and keeps serving the queue
    let value = dispatcher.run_with_result(&cx, || Ok(7)).await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn test_back_to_back_operations_each_arrive_once() {
    let dispatcher = Dispatcher::new(2);
    let cx = dispatcher.register_context();
    // No wait between submissions; completion order is unspecified but
    // each outcome must arrive, and arrive intact.
    let first = dispatcher.run_with_result(&cx, || Ok("first"));
    let second = dispatcher.run_with_result(&cx, || Ok("second"));
    let (a, b) = tokio::join!(first, second);
    assert_eq!(a.unwrap(), "first");
    assert_eq!(b.unwrap(), "second");
}

#[tokio::test]
async fn test_contexts_get_distinct_ids() {
    let dispatcher = Dispatcher::new(1);
    let a = dispatcher.register_context();
    let b = dispatcher.register_context();
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_registry_sweeps_dead_entries_on_register() {
    let registry = ContextRegistry::new();
    drop(registry.register());
    drop(registry.register());
    let _live = registry.register();
    // Registration swept the two dead entries before inserting
    assert_eq!(registry.tracked_contexts(), 1);
}

#[tokio::test]
async fn test_many_concurrent_submissions() {
    let dispatcher = Dispatcher::new(2);
    let cx = dispatcher.register_context();
    let completions: Vec<_> = (0..32)
        .map(|i| dispatcher.run_with_result(&cx, move || Ok(i * 2)))
        .collect();
    for (i, completion) in completions.into_iter().enumerate() {
        assert_eq!(completion.await.unwrap(), i * 2);
    }
}
