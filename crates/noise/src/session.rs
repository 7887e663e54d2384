//! An established Noise transport session: symmetric encrypt/decrypt only,
//! no more handshake state.

use snow::TransportState;

use crate::{Error, Result};

/// Per-message AEAD tag overhead added by `ChaChaPoly`.
const TAG_LEN: usize = 16;

/// One peer's established transport session. Encryption and decryption both
/// advance internal nonce counters; a session is single-peer, not shared
/// across connections.
pub struct NoiseSession {
    transport: TransportState,
}

impl NoiseSession {
    pub(crate) fn new(transport: TransportState) -> Self {
        Self { transport }
    }

    /// Encrypts `plaintext`, returning ciphertext with its trailing AEAD
    /// tag.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; plaintext.len() + TAG_LEN];
        let len = self.transport.write_message(plaintext, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Decrypts `ciphertext`, stripping its AEAD tag.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_LEN {
            return Err(Error::Protocol(snow::Error::Decrypt));
        }
        let mut buf = vec![0u8; ciphertext.len()];
        let len = self.transport.read_message(ciphertext, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// The remote peer's static public key, bound during the handshake.
    #[must_use]
    pub fn remote_static(&self) -> Option<[u8; 32]> {
        self.transport.get_remote_static().map(|bytes| {
            let mut out = [0u8; 32];
            out.copy_from_slice(bytes);
            out
        })
    }
}
