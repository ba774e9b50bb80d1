//! The [`Packet`] buffer: sequential reads and builder-style writes.

use bytes::{Buf, BufMut, BytesMut};

use crate::PacketError;

/// One protocol payload: a byte buffer plus a read cursor.
///
/// A packet is either *being built* (via the `write_*` methods, which
/// chain) or *being read* (via the `read_*` methods, which consume fields
/// strictly in wire order). The same type serves both directions because
/// the protocol is symmetric — tests build a packet and feed it straight
/// back to a decoder.
///
/// ```text
/// ┌────────┬────────┬──────────────────────────────┐
/// │  c (1) │ cc (1) │ fields, in layout order …    │
/// └────────┴────────┴──────────────────────────────┘
/// ```
///
/// The 2-byte opcode pair is ordinary payload data: [`Packet::new`] writes
/// it, [`Packet::read_code`] reads it.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    buf: BytesMut,
    /// Read cursor — index of the next unread byte.
    pos: usize,
}

impl Packet {
    /// Creates an empty packet with no opcode pair.
    ///
    /// Used for bodies that are embedded in another frame (e.g. the data
    /// segment of a community-platform message).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a packet seeded with the given opcode pair.
    pub fn new(c: u8, cc: u8) -> Self {
        let mut packet = Self::default();
        packet.write_u8(c).write_u8(cc);
        packet
    }

    /// Wraps received payload bytes for reading.
    pub fn from_bytes(data: impl Into<BytesMut>) -> Self {
        Self {
            buf: data.into(),
            pos: 0,
        }
    }

    /// The full payload, including any bytes already read.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes not yet consumed by a read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    // -- Reads ------------------------------------------------------------

    /// Checks that `needed` bytes remain, then returns a cursor over them.
    fn take(&mut self, needed: usize) -> Result<&[u8], PacketError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(PacketError::UnexpectedEof { needed, remaining });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&self.buf[start..start + needed])
    }

    /// Reads the 2-byte opcode pair.
    pub fn read_code(&mut self) -> Result<(u8, u8), PacketError> {
        Ok((self.read_u8()?, self.read_u8()?))
    }

    /// Reads one unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?.get_u8())
    }

    /// Reads a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        Ok(self.take(2)?.get_u16())
    }

    /// Reads a big-endian 24-bit unsigned integer.
    pub fn read_u24(&mut self) -> Result<u32, PacketError> {
        let bytes = self.take(3)?;
        Ok(u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2]))
    }

    /// Reads a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        Ok(self.take(4)?.get_u32())
    }

    /// Reads one byte as a boolean (any non-zero value is `true`).
    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a `u16`-length-prefixed run of raw bytes.
    pub fn read_string(&mut self) -> Result<Vec<u8>, PacketError> {
        let len = self.read_u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a `u16`-length-prefixed UTF-8 string.
    pub fn read_utf(&mut self) -> Result<String, PacketError> {
        Ok(String::from_utf8(self.read_string()?)?)
    }

    /// Consumes and returns every unread byte.
    pub fn take_remaining(&mut self) -> Vec<u8> {
        let rest = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();
        rest
    }

    // -- Writes -----------------------------------------------------------

    /// Appends one byte.
    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    /// Appends a big-endian `u16`.
    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    /// Appends a big-endian 24-bit unsigned integer (low 3 bytes of `value`).
    pub fn write_u24(&mut self, value: u32) -> &mut Self {
        self.buf.put_u8((value >> 16) as u8);
        self.buf.put_u8((value >> 8) as u8);
        self.buf.put_u8(value as u8);
        self
    }

    /// Appends a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    /// Appends a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_u8(u8::from(value))
    }

    /// Appends raw bytes with no length prefix.
    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.put_slice(data);
        self
    }

    /// Appends a `u16`-length-prefixed run of bytes.
    ///
    /// Input longer than `u16::MAX` bytes is truncated — the length prefix
    /// cannot express more.
    pub fn write_string(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len().min(u16::MAX as usize);
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&data[..len]);
        self
    }

    /// Appends a `u16`-length-prefixed UTF-8 string.
    pub fn write_utf(&mut self, value: &str) -> &mut Self {
        self.write_string(value.as_bytes())
    }

    // -- Framing ----------------------------------------------------------

    /// Serializes the payload as one wire frame: `u32` big-endian length
    /// followed by the payload itself.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(4 + self.buf.len());
        frame.put_u32(self.buf.len() as u32);
        frame.extend_from_slice(&self.buf);
        frame
    }

    /// Mutable view of the body — everything after the 2-byte opcode pair.
    ///
    /// This is the region the cipher transforms; the opcode pair itself
    /// always travels in the clear.
    pub fn body_mut(&mut self) -> &mut [u8] {
        let start = 2.min(self.buf.len());
        &mut self.buf[start..]
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Integer reads/writes
    // =====================================================================

    #[test]
    fn test_read_u8_consumes_one_byte() {
        let mut p = Packet::from_bytes(&[7u8, 9][..]);
        assert_eq!(p.read_u8().unwrap(), 7);
        assert_eq!(p.read_u8().unwrap(), 9);
        assert_eq!(p.remaining(), 0);
    }

    #[test]
    fn test_read_u16_is_big_endian() {
        let mut p = Packet::from_bytes(&[0x01u8, 0x02][..]);
        assert_eq!(p.read_u16().unwrap(), 0x0102);
    }

    #[test]
    fn test_read_u24_is_big_endian() {
        let mut p = Packet::from_bytes(&[0x01u8, 0x02, 0x03][..]);
        assert_eq!(p.read_u24().unwrap(), 0x010203);
    }

    #[test]
    fn test_write_u24_round_trip() {
        let mut p = Packet::empty();
        p.write_u24(0xAABBCC);
        assert_eq!(p.read_u24().unwrap(), 0xAABBCC);
    }

    #[test]
    fn test_read_u32_round_trip() {
        let mut p = Packet::empty();
        p.write_u32(0xDEADBEEF);
        assert_eq!(p.read_u32().unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_read_past_end_returns_eof_not_panic() {
        let mut p = Packet::from_bytes(&[1u8][..]);
        let err = p.read_u32().unwrap_err();
        assert!(matches!(
            err,
            PacketError::UnexpectedEof {
                needed: 4,
                remaining: 1
            }
        ));
    }

    // =====================================================================
    // Booleans and strings
    // =====================================================================

    #[test]
    fn test_read_bool_nonzero_is_true() {
        let mut p = Packet::from_bytes(&[0u8, 1, 42][..]);
        assert!(!p.read_bool().unwrap());
        assert!(p.read_bool().unwrap());
        assert!(p.read_bool().unwrap());
    }

    #[test]
    fn test_read_utf_round_trip() {
        let mut p = Packet::empty();
        p.write_utf("en-salonville");
        assert_eq!(p.read_utf().unwrap(), "en-salonville");
    }

    #[test]
    fn test_read_utf_empty_string() {
        let mut p = Packet::empty();
        p.write_utf("");
        assert_eq!(p.read_utf().unwrap(), "");
    }

    #[test]
    fn test_read_utf_rejects_invalid_utf8() {
        let mut p = Packet::empty();
        p.write_string(&[0xFF, 0xFE]);
        assert!(matches!(
            p.read_utf().unwrap_err(),
            PacketError::InvalidUtf8(_)
        ));
    }

    #[test]
    fn test_read_string_truncated_length_prefix_is_eof() {
        // Length prefix promises 10 bytes, only 2 present.
        let mut p = Packet::from_bytes(&[0u8, 10, b'h', b'i'][..]);
        assert!(matches!(
            p.read_string().unwrap_err(),
            PacketError::UnexpectedEof { .. }
        ));
    }

    // =====================================================================
    // Opcode pair and framing
    // =====================================================================

    #[test]
    fn test_new_seeds_opcode_pair() {
        let mut p = Packet::new(26, 3);
        assert_eq!(p.read_code().unwrap(), (26, 3));
    }

    #[test]
    fn test_to_frame_prefixes_payload_length() {
        let mut p = Packet::new(5, 21);
        p.write_bool(true).write_utf("hi");
        let frame = p.to_frame();
        // 4-byte length, then the payload.
        assert_eq!(&frame[..4], &[0, 0, 0, 7]);
        assert_eq!(&frame[4..6], &[5, 21]);
        assert_eq!(frame.len(), 4 + 7);
    }

    #[test]
    fn test_body_mut_excludes_opcode_pair() {
        let mut p = Packet::new(60, 3);
        p.write_u16(48);
        assert_eq!(p.body_mut(), &[0, 48]);
    }

    #[test]
    fn test_writes_chain() {
        let mut p = Packet::new(6, 6);
        p.write_utf("hello").write_u8(1).write_bool(false);
        assert_eq!(p.read_code().unwrap(), (6, 6));
        assert_eq!(p.read_utf().unwrap(), "hello");
        assert_eq!(p.read_u8().unwrap(), 1);
        assert!(!p.read_bool().unwrap());
    }
}
