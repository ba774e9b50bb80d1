//! The event bus: persistent handlers plus one-shot waiters.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;

use crate::error::{HandlerError, WaitError};
use crate::waiter::{WaitFor, WaiterSlot};
use crate::Notify;

/// A persistent handler: called once per matching event, forever.
pub type HandlerFn<N> =
    dyn Fn(N) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;

/// Hook invoked when a persistent handler returns an error.
pub type ErrorHook<N> = dyn Fn(<N as Notify>::Kind, HandlerError) + Send + Sync;

struct Inner<N: Notify> {
    handlers: Mutex<HashMap<N::Kind, Vec<Arc<HandlerFn<N>>>>>,
    waiters: Mutex<HashMap<N::Kind, Vec<WaiterSlot<N>>>>,
    error_hook: Mutex<Option<Box<ErrorHook<N>>>>,
}

/// Routes events to registered handlers and pending waiters.
///
/// Two kinds of consumer coexist:
/// - **handlers** ([`EventBus::on`]) stay registered and run on every
///   matching event, each in its own spawned task;
/// - **waiters** ([`EventBus::wait_for`]) are one-shot: the first matching
///   event resolves them and removes them.
///
/// [`EventBus::dispatch`] resolves waiters *synchronously*, in
/// registration order, before any handler task is spawned. A waiter that
/// asked for [`stop_propagation`](WaitFor::stop_propagation) therefore
/// consumes the event before handlers ever see it.
///
/// Cloning the bus is cheap and shares all registrations.
pub struct EventBus<N: Notify> {
    inner: Arc<Inner<N>>,
}

impl<N: Notify> Clone for EventBus<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N: Notify> Default for EventBus<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Notify> EventBus<N> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                waiters: Mutex::new(HashMap::new()),
                error_hook: Mutex::new(None),
            }),
        }
    }

    /// Registers a persistent handler for one event kind.
    ///
    /// Handlers never block dispatch: each invocation is spawned onto the
    /// runtime. A handler error is reported to the error hook (or logged)
    /// and does not unregister the handler.
    pub fn on<F>(&self, kind: N::Kind, handler: F)
    where
        F: Fn(N) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync + 'static,
    {
        lock(&self.inner.handlers)
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Installs the hook invoked when a persistent handler fails.
    ///
    /// Without a hook, failures are logged at `warn`.
    pub fn on_handler_error<F>(&self, hook: F)
    where
        F: Fn(N::Kind, HandlerError) + Send + Sync + 'static,
    {
        *lock(&self.inner.error_hook) = Some(Box::new(hook));
    }

    /// Starts building a one-shot wait for the next event of `kind`.
    ///
    /// Nothing is registered until [`WaitFor::begin`] is called.
    pub fn wait_for(&self, kind: N::Kind) -> WaitFor<'_, N> {
        WaitFor::new(self, kind)
    }

    pub(crate) fn register_waiter(&self, kind: N::Kind, slot: WaiterSlot<N>) {
        lock(&self.inner.waiters).entry(kind).or_default().push(slot);
    }

    /// Number of live waiters registered for `kind`.
    ///
    /// Cancelled waiters are pruned lazily on dispatch, so the count can
    /// briefly include waiters whose receiver was already dropped.
    pub fn waiter_count(&self, kind: N::Kind) -> usize {
        lock(&self.inner.waiters)
            .get(&kind)
            .map_or(0, |slots| slots.iter().filter(|s| !s.tx.is_closed()).count())
    }

    /// Delivers one event occurrence.
    ///
    /// Waiters for the event's kind are examined in registration order:
    /// cancelled waiters are pruned, predicates run under `catch_unwind`
    /// (a panicking predicate fails its own waiter, never the dispatcher),
    /// and every matching waiter receives a clone of the event. If a
    /// matching waiter requested stop-propagation, later waiters and all
    /// handlers are skipped for this occurrence.
    ///
    /// Must be called from within a Tokio runtime (handlers are spawned).
    pub fn dispatch(&self, event: N) {
        let kind = event.kind();
        if self.resolve_waiters(kind, &event) {
            tracing::trace!(?kind, "event consumed by waiter");
            return;
        }

        let handlers: Vec<Arc<HandlerFn<N>>> = lock(&self.inner.handlers)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            let fut = handler(event.clone());
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                if let Err(error) = fut.await {
                    match &*lock(&inner.error_hook) {
                        Some(hook) => hook(kind, error),
                        None => tracing::warn!(?kind, %error, "event handler failed"),
                    }
                }
            });
        }
    }

    /// Resolves waiters for one occurrence. Returns `true` if a matching
    /// waiter stopped propagation.
    fn resolve_waiters(&self, kind: N::Kind, event: &N) -> bool {
        let mut waiters = lock(&self.inner.waiters);
        let Some(slots) = waiters.get_mut(&kind) else {
            return false;
        };

        let mut stopped = false;
        let mut index = 0;
        while index < slots.len() {
            if slots[index].tx.is_closed() {
                slots.remove(index);
                continue;
            }

            let verdict = match &slots[index].filter {
                Some(filter) => panic::catch_unwind(AssertUnwindSafe(|| filter(event))),
                None => Ok(true),
            };

            match verdict {
                Ok(true) => {
                    let slot = slots.remove(index);
                    let stop = slot.stop_propagation;
                    let _ = slot.tx.send(Ok(event.clone()));
                    if stop {
                        stopped = true;
                        break;
                    }
                }
                Ok(false) => index += 1,
                Err(_) => {
                    tracing::warn!(?kind, "waiter predicate panicked");
                    let slot = slots.remove(index);
                    let _ = slot.tx.send(Err(WaitError::PredicatePanicked));
                }
            }
        }

        if slots.is_empty() {
            waiters.remove(&kind);
        }
        stopped
    }
}

/// Locks a mutex, recovering the guard if a panic elsewhere poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =========================================================================
// Tests
// =========================================================================
