//! The symmetric XOR transform applied to designated payloads.

use crate::PacketError;

/// A rolling XOR cipher keyed by a byte sequence.
///
/// The server obscures authentication and chat-command payloads with a
/// repeating-key XOR, offset by the connection's current fingerprint byte
/// so two identical payloads never produce identical ciphertext. The
/// transform is its own inverse.
#[derive(Debug, Clone)]
pub struct XorCipher {
    key: Vec<u8>,
}

impl XorCipher {
    /// Builds a cipher from a key.
    ///
    /// # Errors
    /// Returns [`PacketError::EmptyCipherKey`] for an empty key — an empty
    /// key would make the transform a no-op and index arithmetic below
    /// divide by zero.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, PacketError> {
        let key = key.into();
        if key.is_empty() {
            return Err(PacketError::EmptyCipherKey);
        }
        Ok(Self { key })
    }

    /// Transforms `body` in place, starting the key at `offset`.
    ///
    /// `offset` is the connection fingerprint at send time; the receiver
    /// applies the same call to decrypt.
    pub fn transform(&self, body: &mut [u8], offset: u8) {
        let len = self.key.len();
        for (i, byte) in body.iter_mut().enumerate() {
            *byte ^= self.key[(i + offset as usize) % len];
        }
    }
}
