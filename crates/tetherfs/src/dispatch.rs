//! The context-affine dispatch primitive
//!
//! Every filesystem entry point reduces to one of two calls here: run a
//! blocking operation on the worker pool and deliver its outcome - value
//! or domain error - back to the context that submitted it, exactly once.

use crate::completion::Completion;
use crate::context::{Context, ContextRegistry};
use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Cheap-clone handle over the worker pool and context registry.
///
/// Cancellation is not supported: once submitted, an operation runs to
/// completion or failure.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
    registry: Arc<ContextRegistry>,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Self {
        Dispatcher {
            pool: Arc::new(WorkerPool::new(workers)),
            registry: Arc::new(ContextRegistry::new()),
        }
    }

    pub fn register_context(&self) -> Context {
        self.registry.register()
    }

    /// Run a blocking operation on the pool; its outcome is delivered to
    /// the submitting context.
    ///
    /// The caller's context id is captured here, synchronously - capturing
    /// it any later would tie the outcome to whatever context happens to be
    /// executing then. A panicking operation is converted into a delivered
    /// `Fault` error; the pool is unaffected.
    pub fn run_with_result<T, F>(&self, cx: &Context, op: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let id = cx.id();
        let registry = Arc::clone(&self.registry);
        let (tx, completion) = Completion::channel(cx);
        self.pool.submit(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(op))
                .unwrap_or_else(|payload| Err(Error::fault(panic_message(payload.as_ref()))));
            registry.deliver(
                id,
                Box::new(move || {
                    let _ = tx.send(outcome);
                }),
            );
        });
        completion
    }

    /// `run_with_result` for operations with no result value.
    pub fn run_void<F>(&self, cx: &Context, op: F) -> Completion<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.run_with_result(cx, op)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".to_string()
    }
}
