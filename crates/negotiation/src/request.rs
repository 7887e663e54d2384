//! The literal wire framing for version-negotiation packets (`spec.md` §3):
//! a request carries the sender's preferred/supported versions plus an
//! optional piggybacked Noise handshake message; a response carries the
//! agreed version plus its own optional piggybacked reply. Piggybacking the
//! first Noise message onto the negotiation request lets a peer that
//! already knows it wants `NoiseIK` save a round trip instead of negotiating
//! the version first and starting the handshake only afterward.
//!
//! Both framings end in a `legacy_tail`: whatever bytes remain after the
//! declared noise-body length, preserved byte-for-byte so an older peer's
//! trailing, not-yet-understood fields survive a round trip through a
//! newer parser untouched.

use crate::version::ProtocolVersion;
use crate::{Error, Result};

/// `[preferred:1][n:1][versions:n][noise_len:2][noise_bytes:noise_len][legacy_tail:*]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The version the sender would prefer to use.
    pub preferred: ProtocolVersion,
    /// Every version the sender is willing to speak, in the sender's own
    /// order.
    pub versions: Vec<ProtocolVersion>,
    /// An optional piggybacked Noise-IK handshake message (empty if the
    /// sender prefers to negotiate the version before starting Noise).
    pub noise_bytes: Vec<u8>,
    /// Trailing bytes the sender appended after its declared noise body,
    /// preserved verbatim.
    pub legacy_tail: Vec<u8>,
}

/// `[agreed:1][noise_len:2][noise_bytes:noise_len][legacy_tail:*]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The version the responder selected.
    pub agreed: ProtocolVersion,
    /// An optional piggybacked Noise-IK handshake reply.
    pub noise_bytes: Vec<u8>,
    /// Trailing bytes the responder appended after its declared noise
    /// body, preserved verbatim.
    pub legacy_tail: Vec<u8>,
}

impl HandshakeRequest {
    /// Serializes this request to its wire form.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.versions.len() + self.noise_bytes.len() + self.legacy_tail.len());
        out.push(self.preferred.as_u8());
        out.push(self.versions.len() as u8);
        out.extend(self.versions.iter().map(|v| v.as_u8()));
        out.extend_from_slice(&(self.noise_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.noise_bytes);
        out.extend_from_slice(&self.legacy_tail);
        out
    }

    /// Parses a request previously produced by [`Self::serialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCapabilities`] if `bytes` is too short for
    /// its own declared `n` or `noise_len`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (&preferred, rest) = bytes.split_first().ok_or(Error::MalformedCapabilities)?;
        let (&n, rest) = rest.split_first().ok_or(Error::MalformedCapabilities)?;
        let n = n as usize;
        if rest.len() < n + 2 {
            return Err(Error::MalformedCapabilities);
        }
        let versions = rest[..n].iter().map(|&b| ProtocolVersion::from_u8(b)).collect();
        let rest = &rest[n..];
        let noise_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        let rest = &rest[2..];
        if rest.len() < noise_len {
            return Err(Error::MalformedCapabilities);
        }
        let noise_bytes = rest[..noise_len].to_vec();
        let legacy_tail = rest[noise_len..].to_vec();

        Ok(Self {
            preferred: ProtocolVersion::from_u8(preferred),
            versions,
            noise_bytes,
            legacy_tail,
        })
    }
}

impl HandshakeResponse {
    /// Serializes this response to its wire form.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + self.noise_bytes.len() + self.legacy_tail.len());
        out.push(self.agreed.as_u8());
        out.extend_from_slice(&(self.noise_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.noise_bytes);
        out.extend_from_slice(&self.legacy_tail);
        out
    }

    /// Parses a response previously produced by [`Self::serialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCapabilities`] if `bytes` is too short for
    /// its own declared `noise_len`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (&agreed, rest) = bytes.split_first().ok_or(Error::MalformedCapabilities)?;
        if rest.len() < 2 {
            return Err(Error::MalformedCapabilities);
        }
        let noise_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        let rest = &rest[2..];
        if rest.len() < noise_len {
            return Err(Error::MalformedCapabilities);
        }
        let noise_bytes = rest[..noise_len].to_vec();
        let legacy_tail = rest[noise_len..].to_vec();

        Ok(Self {
            agreed: ProtocolVersion::from_u8(agreed),
            noise_bytes,
            legacy_tail,
        })
    }
}
