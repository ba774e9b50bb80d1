//! TCP connections and wire framing for the Fennec client.
//!
//! The client holds two connections at once: the long-lived *main*
//! connection (authentication, chat routing, community platform) and a
//! *room-data* connection that is replaced wholesale on every room/server
//! transfer. Both are instances of [`Connection`]:
//!
//! - a background read loop decodes one length-prefixed frame at a time
//!   and forwards it to the owner as a [`NetEvent`];
//! - `send` composes a whole frame and writes it under a per-connection
//!   lock, so concurrent logical senders (heartbeat, user commands) can
//!   never interleave within one frame;
//! - `close` is idempotent and terminates the read loop.

mod connection;
mod error;

pub use connection::{Connection, NetEvent};
pub use error::NetError;

use std::fmt;

/// Identity tag for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// The long-lived authentication/session connection.
    Main,
    /// The per-room data connection, replaced on server transfer.
    RoomData,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::RoomData => write!(f, "room-data"),
        }
    }
}
