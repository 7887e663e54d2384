#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `meshwire-wire` is the leaf crate of the meshwire transport: it owns the
//! on-the-wire byte shapes and nothing else. No socket, no handshake state,
//! no scheduling — just `serialize`/`parse` pairs for the packet envelope,
//! the peer-address encoding used in inter-node signalling, and the 4-byte
//! length framing used by stream transports.
//!
//! # Design
//!
//! [`packet::Packet`] is a one-byte type tag plus an opaque payload.
//! [`packet::PacketType`] classifies the tag into the ranges the rest of the
//! workspace dispatches on (DHT, friend, onion, file, misc, version
//! negotiation, Noise handshake, Noise message) so call sites match on a
//! closed enum instead of guarding on magic numbers. [`address::PeerAddress`]
//! is the 6-byte (IPv4) / 18-byte (IPv6) encoding used whenever an address
//! needs to travel over the wire (STUN results, signalling). [`framing`]
//! implements the big-endian length-prefixed stream framing shared by every
//! stream transport in the workspace.
//!
//! # Invariants
//!
//! - `parse(serialize(p)) == p` for every well-formed [`packet::Packet`].
//! - [`framing::read_framed`] never treats a short read as success; a
//!   partial length prefix or body is [`Error::UnexpectedEof`].
//! - [`address::PeerAddress`] equality is defined over the canonical wire
//!   bytes, never the `Display` string (see [`address::PeerAddress::to_bytes`]).
//!
//! # Errors
//!
//! All fallible operations return [`Error`], a [`thiserror::Error`] enum
//! covering malformed/truncated input and nil-payload precondition
//! failures. See each module for which variants it can produce.

/// Peer-address wire encoding (IPv4/IPv6, 6 or 18 bytes, port big-endian).
pub mod address;
/// Cooperative cancellation and deadline helpers shared by every blocking
/// operation in the workspace.
pub mod control;
/// Length-prefixed stream framing (4-byte big-endian length + payload).
pub mod framing;
/// Packet type tags, the opaque packet envelope, and the DHT `NodePacket`.
pub mod packet;

pub use address::PeerAddress;
pub use control::{CancellationToken, Deadline};
pub use packet::{NodePacket, Packet, PacketType};

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum Error {
    /// `parse` was called with zero input bytes.
    #[error("malformed packet: empty input")]
    MalformedPacket,
    /// `serialize` was asked to emit a packet whose type requires a payload
    /// but none was supplied.
    #[error("invalid packet: type {packet_type} requires a non-empty payload")]
    InvalidPacket {
        /// The packet type tag that rejected the nil payload.
        packet_type: u8,
    },
    /// Input was shorter than the type's fixed minimum length (e.g. a
    /// `NodePacket` under 56 bytes).
    #[error("truncated packet: expected at least {expected} bytes, got {actual}")]
    TruncatedPacket {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes actually present.
        actual: usize,
    },
    /// A stream read-full completed with fewer bytes than requested before
    /// hitting EOF.
    #[error("unexpected EOF: expected {expected} bytes, got {actual}")]
    UnexpectedEof {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes read before EOF.
        actual: usize,
    },
    /// The address byte count did not match 6 (IPv4) or 18 (IPv6).
    #[error("invalid address encoding: expected 6 or 18 bytes, got {actual}")]
    InvalidAddressEncoding {
        /// Number of bytes actually present.
        actual: usize,
    },
    /// The operation was cancelled before it could complete.
    #[error("operation cancelled")]
    Cancelled,
    /// The operation exceeded its deadline.
    #[error("operation timed out")]
    Timeout,
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;
