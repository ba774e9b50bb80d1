//! Binary frame codec for the Fennec game protocol.
//!
//! Every unit of wire data is a *frame*: a 4-byte big-endian length prefix
//! followed by a payload that begins with a 2-byte opcode pair. This crate
//! provides:
//!
//! - [`Packet`] — cursor-based sequential reads and builder-style
//!   sequential writes over one payload. Fields on this protocol carry no
//!   tags, so read order **is** the contract.
//! - [`XorCipher`] — the symmetric transform applied to designated
//!   payloads (authentication, chat commands) before framing.
//! - [`PacketError`] — what can go wrong while reading.
//!
//! The codec knows nothing about sockets or opcodes' meanings; those live
//! in `fennec-net` and `fennec-protocol`.

mod cipher;
mod error;
mod packet;

pub use cipher::XorCipher;
pub use error::PacketError;
pub use packet::Packet;
