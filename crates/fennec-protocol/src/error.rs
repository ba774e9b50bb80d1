//! Error types for the dispatch layer.

use fennec_packet::PacketError;

use crate::OpcodePair;

/// Errors that can occur while decoding a frame.
///
/// An *unknown* opcode pair is not an error — the dispatcher reports it as
/// [`Event::Unhandled`](crate::Event::Unhandled) so callers can log and
/// continue. These variants cover frames whose opcode is known but whose
/// payload does not match the declared layout.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The payload ended before the layout was fully read.
    #[error("truncated frame: {0}")]
    Truncated(#[from] PacketError),

    /// The payload decoded but violates the frame's rules.
    #[error("malformed {opcode} frame: {reason}")]
    Malformed {
        /// The frame type being decoded.
        opcode: OpcodePair,
        /// What was wrong.
        reason: String,
    },
}
