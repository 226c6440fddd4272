use crate::context::{Context, ContextInner};
use crate::error::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{self, Poll};
use tokio::sync::oneshot;

/// One-shot delivery vehicle for an operation's outcome.
///
/// Resolves to the operation's success value or domain error, exactly once.
/// Polling first drains the owning context's delivery queue, so outcomes
/// are always handed over inside the owning context's execution and never
/// on a worker thread. The future is expected to be awaited from the task
/// driving the context that submitted the operation.
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
    owner: Arc<ContextInner>,
}

impl<T> Completion<T> {
    /// Open a completion for the given context, returning the fulfilment
    /// side for the dispatcher to hand to the worker.
    pub(crate) fn channel(cx: &Context) -> (oneshot::Sender<Result<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Completion {
                rx,
                owner: cx.shared(),
            },
        )
    }

    /// An already-resolved completion, for outcomes known before dispatch
    /// (a closed handle, for example). The worker pool is never touched.
    pub(crate) fn settled(cx: &Context, outcome: Result<T>) -> Self {
        let (tx, completion) = Self::channel(cx);
        let _ = tx.send(outcome);
        completion
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        // Park the waker before draining: a delivery that lands between
        // the drain and the receiver poll still wakes this task.
        this.owner.register_waker(cx.waker());
        this.owner.drain();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The sender only disappears without sending when the pool is
            // torn down with the operation still queued.
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Shutdown)),
            Poll::Pending => Poll::Pending,
        }
    }
}
