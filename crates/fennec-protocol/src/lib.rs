//! Opcode catalogue and frame dispatcher.
//!
//! This crate turns raw frames into typed [`Event`]s. The protocol is
//! opcode-multiplexed: every frame opens with an [`OpcodePair`] that
//! selects the entire field layout, with no field tags after it. The
//! [`Dispatcher`] holds one decode function per known pair, handles the
//! legacy string-envelope protocol, and reports unknown pairs as
//! [`Event::Unhandled`] instead of failing.
//!
//! Decoding is pure: no I/O, no session state. Connection and session
//! effects live in the crates above this one.

mod dispatcher;
mod error;
mod event;
mod opcode;

pub use dispatcher::{DecodeFn, Dispatcher, LegacyDecodeFn};
pub use error::ProtocolError;
pub use event::{encode_roster, Event, InventoryEntry, PlatformEvent, PlayerProfile};
pub use opcode::OpcodePair;
