//! One-shot waiters and their builder.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::bus::EventBus;
use crate::error::WaitError;
use crate::Notify;

/// Predicate examining a candidate event for a waiter.
pub type FilterFn<N> = dyn Fn(&N) -> bool + Send;

pub(crate) struct WaiterSlot<N> {
    pub(crate) tx: oneshot::Sender<Result<N, WaitError>>,
    pub(crate) filter: Option<Box<FilterFn<N>>>,
    pub(crate) stop_propagation: bool,
}

/// Builder for a one-shot wait. Created by [`EventBus::wait_for`].
///
/// The waiter is registered only when [`begin`](WaitFor::begin) is called;
/// events dispatched before that are not seen.
pub struct WaitFor<'a, N: Notify> {
    bus: &'a EventBus<N>,
    kind: N::Kind,
    filter: Option<Box<FilterFn<N>>>,
    timeout: Option<Duration>,
    stop_propagation: bool,
}

impl<'a, N: Notify> WaitFor<'a, N> {
    pub(crate) fn new(bus: &'a EventBus<N>, kind: N::Kind) -> Self {
        Self {
            bus,
            kind,
            filter: None,
            timeout: None,
            stop_propagation: false,
        }
    }

    /// Only resolve on events for which `filter` returns `true`;
    /// non-matching events leave the waiter registered.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&N) -> bool + Send + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Fail the wait with [`WaitError::TimedOut`] if no matching event
    /// arrives within `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consume the matching occurrence: waiters registered later and all
    /// persistent handlers are skipped for that event.
    pub fn stop_propagation(mut self) -> Self {
        self.stop_propagation = true;
        self
    }

    /// Registers the waiter and returns the handle to await.
    pub fn begin(self) -> Waiter<N> {
        let (tx, rx) = oneshot::channel();
        self.bus.register_waiter(
            self.kind,
            WaiterSlot {
                tx,
                filter: self.filter,
                stop_propagation: self.stop_propagation,
            },
        );
        Waiter {
            rx,
            timeout: self.timeout,
        }
    }
}

/// A registered one-shot waiter.
///
/// Dropping the waiter cancels it; the bus prunes the dead registration on
/// the next dispatch of its kind.
pub struct Waiter<N> {
    rx: oneshot::Receiver<Result<N, WaitError>>,
    timeout: Option<Duration>,
}

impl<N> Waiter<N> {
    /// Waits for the matching event.
    ///
    /// # Errors
    /// [`WaitError::TimedOut`] if the deadline passed,
    /// [`WaitError::PredicatePanicked`] if the filter panicked, or
    /// [`WaitError::BusClosed`] if the bus was dropped first.
    pub async fn wait(self) -> Result<N, WaitError> {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(WaitError::BusClosed),
                Err(_) => Err(WaitError::TimedOut),
            },
            None => match self.rx.await {
                Ok(result) => result,
                Err(_) => Err(WaitError::BusClosed),
            },
        }
    }
}
