//! Error types for the packet codec.

/// Errors that can occur while reading a packet.
///
/// Writes never fail — the buffer grows as needed. Reads fail when the
/// wire data is shorter than the layout demands or a string field is not
/// valid UTF-8.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// A read ran past the end of the buffer.
    #[error("unexpected end of packet: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A length-prefixed string field was not valid UTF-8.
    #[error("invalid utf-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An [`XorCipher`](crate::XorCipher) was built from an empty key.
    #[error("cipher key must not be empty")]
    EmptyCipherKey,
}
