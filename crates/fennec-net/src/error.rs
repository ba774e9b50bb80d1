//! Error types for the connection layer.

/// Errors that can occur on a [`Connection`](crate::Connection).
///
/// Failure to *establish* transport ([`NetError::ConnectFailed`]) is
/// distinct from losing an established connection
/// ([`NetError::ConnectionLost`]): the first is retried across fallback
/// endpoints by the owner, the second is reported once and triggers
/// cleanup of dependent state.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The TCP connection attempt could not complete.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// No endpoint in the fallback list accepted the connection.
    #[error("all {0} fallback endpoints exhausted")]
    EndpointsExhausted(usize),

    /// An established connection was lost (EOF or reset).
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] std::io::Error),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The connection is closed; the frame was not sent.
    #[error("connection is closed")]
    Closed,

    /// A ciphered send was requested on a connection built without a cipher.
    #[error("no cipher configured for this connection")]
    CipherUnavailable,

    /// The peer announced a frame larger than the protocol allows.
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    FrameTooLarge(u32, u32),
}
