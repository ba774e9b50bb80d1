//! Event bus with persistent handlers and one-shot waiters.
//!
//! Generic over the event type: anything implementing [`Notify`] can be
//! dispatched. Persistent handlers ([`EventBus::on`]) run on every
//! matching event in their own task; waiters ([`EventBus::wait_for`]) are
//! resolved synchronously during dispatch, in registration order, and can
//! consume an occurrence before handlers see it.

use std::fmt;
use std::hash::Hash;

mod bus;
mod error;
mod waiter;

pub use bus::{ErrorHook, EventBus, HandlerFn};
pub use error::{HandlerError, WaitError};
pub use waiter::{FilterFn, WaitFor, Waiter};

/// An event that can be dispatched on an [`EventBus`].
pub trait Notify: Clone + Send + 'static {
    /// The discriminant handlers and waiters subscribe to.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + 'static;

    /// This event's discriminant.
    fn kind(&self) -> Self::Kind;
}
