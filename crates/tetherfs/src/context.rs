//! Execution contexts and outcome routing
//!
//! A `Context` stands for one logical caller: the unit of ownership for
//! file handles and the single destination for operation outcomes. There
//! is no ambient current-context lookup; callers pass their `Context`
//! explicitly into every entry point and the dispatcher captures its id
//! at submission time.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::Waker;

/// A queued outcome hand-off, run inside the owning context's execution.
pub(crate) type Delivery = Box<dyn FnOnce() + Send + 'static>;

/// Opaque token identifying a logical execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) struct ContextInner {
    id: ContextId,
    queue: Mutex<VecDeque<Delivery>>,
    wakers: Mutex<Vec<Waker>>,
}

impl ContextInner {
    /// Run every queued delivery. Thunks execute outside the queue lock.
    pub(crate) fn drain(&self) {
        loop {
            let next = lock(&self.queue).pop_front();
            match next {
                Some(thunk) => thunk(),
                None => break,
            }
        }
    }

    /// Park a waker to be woken on the next delivery. A context is driven
    /// by a single task, but joined completions may register more than one
    /// waker between wakes; all of them are woken.
    pub(crate) fn register_waker(&self, waker: &Waker) {
        let mut wakers = lock(&self.wakers);
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    fn push(&self, delivery: Delivery) {
        lock(&self.queue).push_back(delivery);
        let woken = std::mem::take(&mut *lock(&self.wakers));
        for waker in woken {
            waker.wake();
        }
    }
}

/// Handle to a registered execution context.
///
/// Cheap to clone; all clones refer to the same logical context. A handle
/// is meant to live inside a single task - the completions it receives
/// resolve when that task polls them.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub(crate) fn shared(&self) -> Arc<ContextInner> {
        self.inner.clone()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.inner.id).finish()
    }
}

/// Mints context ids and routes deliveries to live contexts.
///
/// The registry knows nothing about filesystem semantics; it is a pure
/// routing mechanism from `ContextId` to that context's delivery queue.
pub struct ContextRegistry {
    next_id: AtomicU64,
    contexts: Mutex<HashMap<ContextId, Weak<ContextInner>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        ContextRegistry {
            next_id: AtomicU64::new(1),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Create a fresh execution context.
    pub fn register(&self) -> Context {
        let id = ContextId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let inner = Arc::new(ContextInner {
            id,
            queue: Mutex::new(VecDeque::new()),
            wakers: Mutex::new(Vec::new()),
        });
        let mut contexts = lock(&self.contexts);
        // Entries for dropped contexts are swept here so the map does not
        // accumulate dead weaks between deliveries.
        contexts.retain(|_, weak| weak.strong_count() > 0);
        contexts.insert(id, Arc::downgrade(&inner));
        drop(contexts);
        diagnostics::log_debug!("Registered context {id}", id: id.to_string());
        Context { inner }
    }

    #[cfg(test)]
    pub(crate) fn tracked_contexts(&self) -> usize {
        lock(&self.contexts).len()
    }

    /// Schedule an outcome hand-off into the owning context's queue.
    ///
    /// Deliveries to a context that no longer exists are dropped; the
    /// completion on the other end is gone with the context.
    pub(crate) fn deliver(&self, id: ContextId, delivery: Delivery) {
        let target = lock(&self.contexts).get(&id).and_then(Weak::upgrade);
        match target {
            Some(inner) => inner.push(delivery),
            None => {
                lock(&self.contexts).remove(&id);
                diagnostics::log_debug!(
                    "Dropped delivery for dead context {id}",
                    id: id.to_string()
                );
            }
        }
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}
