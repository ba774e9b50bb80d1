//! Error types for waiters and handlers.

/// Error returned by a persistent event handler.
///
/// Handler failures never tear down the bus; they are reported to the
/// error hook (or logged) and the bus keeps dispatching.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Why a one-shot wait did not produce an event.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The deadline passed before a matching event was dispatched.
    #[error("timed out waiting for event")]
    TimedOut,

    /// The waiter's predicate panicked while examining an event.
    ///
    /// The waiter is completed with this error rather than poisoning the
    /// dispatching task.
    #[error("waiter predicate panicked")]
    PredicatePanicked,

    /// The bus was dropped while the waiter was still registered.
    #[error("event bus closed")]
    BusClosed,
}
