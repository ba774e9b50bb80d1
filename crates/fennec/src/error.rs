//! Client-level error taxonomy.
//!
//! Mirrors the layering: every sub-crate error converts into
//! [`ClientError`] with `#[from]`, so `?` works across the whole stack.

use fennec_events::WaitError;
use fennec_net::NetError;
use fennec_protocol::ProtocolError;

/// Why the server refused a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LoginFailure {
    /// The account already has a live session.
    #[error("account already connected")]
    AlreadyConnected,

    /// Bad username or password hash.
    #[error("incorrect username or password")]
    IncorrectCredentials,

    /// Any other refusal; the raw code is kept for diagnostics.
    #[error("login refused (code {0})")]
    Other(u8),
}

impl LoginFailure {
    /// Maps the wire failure code to its variant.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::AlreadyConnected,
            2 => Self::IncorrectCredentials,
            other => Self::Other(other),
        }
    }
}

/// Top-level error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure.
    #[error(transparent)]
    Net(#[from] NetError),

    /// A frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A one-shot wait failed.
    #[error(transparent)]
    Wait(#[from] WaitError),

    /// The server refused the login.
    #[error(transparent)]
    Login(#[from] LoginFailure),

    /// The operation needs a connection that is not established.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called while a session is already up.
    #[error("already connected")]
    AlreadyConnected,

    /// A caller-supplied value violates the protocol's limits.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
