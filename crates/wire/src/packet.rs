//! The opaque packet envelope and its type-tag classification.

use crate::{Error, Result};

/// Classification of a packet's one-byte type tag into the ranges the rest
/// of the workspace dispatches on. `Unknown` carries the raw tag for any
/// value outside the named ranges, keeping dispatch a closed match instead
/// of a chain of numeric guards (`spec.md` §9: "Dispatch by packet type").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// DHT packets, tags 1..=4.
    Dht(u8),
    /// Friend-protocol packets, tags 5..=8.
    Friend(u8),
    /// Onion-routing packets, tags 9..=15. The onion network itself is an
    /// external collaborator; this crate only classifies the tag.
    Onion(u8),
    /// File-transfer packets, tags 16..=19.
    File(u8),
    /// Miscellaneous packets, tags 20..=21.
    Misc(u8),
    /// Version negotiation, tag 249.
    VersionNegotiation,
    /// Noise handshake, tag 250. Bypasses encryption.
    NoiseHandshake,
    /// Noise message, tag 251. Opaque ciphertext wrapping an inner packet.
    NoiseMessage,
    /// Any tag not covered by the ranges above.
    Unknown(u8),
}

impl PacketType {
    /// Classifies a raw type tag.
    #[must_use]
    pub const fn classify(tag: u8) -> Self {
        match tag {
            1..=4 => PacketType::Dht(tag),
            5..=8 => PacketType::Friend(tag),
            9..=15 => PacketType::Onion(tag),
            16..=19 => PacketType::File(tag),
            20..=21 => PacketType::Misc(tag),
            249 => PacketType::VersionNegotiation,
            250 => PacketType::NoiseHandshake,
            251 => PacketType::NoiseMessage,
            tag => PacketType::Unknown(tag),
        }
    }

    /// Returns the raw type tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            PacketType::Dht(tag)
            | PacketType::Friend(tag)
            | PacketType::Onion(tag)
            | PacketType::File(tag)
            | PacketType::Misc(tag)
            | PacketType::Unknown(tag) => tag,
            PacketType::VersionNegotiation => 249,
            PacketType::NoiseHandshake => 250,
            PacketType::NoiseMessage => 251,
        }
    }

    /// Whether this type tag permits an empty payload. Only the reserved
    /// control types and the misc range tolerate a nil body; everything
    /// else demands at least one payload byte.
    #[must_use]
    pub const fn allows_empty_payload(self) -> bool {
        matches!(
            self,
            PacketType::Misc(_)
                | PacketType::VersionNegotiation
                | PacketType::NoiseHandshake
                | PacketType::NoiseMessage
        )
    }
}

/// A typed packet: one-byte type tag followed by an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    packet_type: u8,
    payload: Vec<u8>,
}

impl Packet {
    /// Builds a packet from a raw type tag and payload.
    #[must_use]
    pub const fn new(packet_type: u8, payload: Vec<u8>) -> Self {
        Self { packet_type, payload }
    }

    /// The raw type tag.
    #[must_use]
    pub const fn packet_type(&self) -> u8 {
        self.packet_type
    }

    /// The classified type.
    #[must_use]
    pub const fn kind(&self) -> PacketType {
        PacketType::classify(self.packet_type)
    }

    /// The opaque payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the packet, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Serializes the packet to its wire form: one type byte followed by
    /// the payload. Fails with [`Error::InvalidPacket`] if the payload is
    /// empty and the type does not permit that.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.payload.is_empty() && !self.kind().allows_empty_payload() {
            return Err(Error::InvalidPacket {
                packet_type: self.packet_type,
            });
        }
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.packet_type);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parses a packet from its wire form. Fails with
    /// [`Error::MalformedPacket`] on empty input.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (&packet_type, payload) = bytes.split_first().ok_or(Error::MalformedPacket)?;
        Ok(Self {
            packet_type,
            payload: payload.to_vec(),
        })
    }
}

/// Minimum size of a serialized [`NodePacket`]: 32-byte public key + 24-byte
/// nonce + at least zero payload bytes.
pub const NODE_PACKET_MIN_LEN: usize = 32 + 24;

/// DHT node packet variant: fixed 32-byte public key, 24-byte nonce, and an
/// opaque (typically encrypted) payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodePacket {
    public_key: [u8; 32],
    nonce: [u8; 24],
    payload: Vec<u8>,
}

impl NodePacket {
    /// Builds a node packet from its fixed fields and payload.
    #[must_use]
    pub const fn new(public_key: [u8; 32], nonce: [u8; 24], payload: Vec<u8>) -> Self {
        Self {
            public_key,
            nonce,
            payload,
        }
    }

    /// The sender's public key.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// The per-packet nonce.
    #[must_use]
    pub const fn nonce(&self) -> &[u8; 24] {
        &self.nonce
    }

    /// The opaque payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serializes as `public_key || nonce || payload`.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NODE_PACKET_MIN_LEN + self.payload.len());
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parses `public_key || nonce || payload`. Fails with
    /// [`Error::TruncatedPacket`] if fewer than 56 bytes are supplied.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NODE_PACKET_MIN_LEN {
            return Err(Error::TruncatedPacket {
                expected: NODE_PACKET_MIN_LEN,
                actual: bytes.len(),
            });
        }
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&bytes[0..32]);
        let mut nonce = [0u8; 24];
        nonce.copy_from_slice(&bytes[32..56]);
        Ok(Self {
            public_key,
            nonce,
            payload: bytes[56..].to_vec(),
        })
    }
}
