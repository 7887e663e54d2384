//! Version negotiation between [`ProtocolVersion::Legacy`] and
//! [`ProtocolVersion::NoiseIK`] peers.
//!
//! Negotiation travels as packet type 249: a peer advertises its
//! [`Capabilities`] and waits for the other side's reply via a
//! [`Negotiator`], then both sides independently run [`select_best_version`]
//! over the pair to agree on a version without a third round trip.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod capabilities;
mod negotiator;
mod request;
mod version;

use std::net::SocketAddr;

pub use capabilities::{select_best_version, Capabilities, NegotiationDeadline};
pub use negotiator::{Negotiator, PendingNegotiation};
pub use request::{HandshakeRequest, HandshakeResponse};
pub use version::ProtocolVersion;

/// The reserved packet type byte carrying negotiation payloads.
pub const PACKET_TYPE_VERSION_NEGOTIATION: u8 = 249;

/// Errors arising during version negotiation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A type-249 payload was truncated or otherwise unparseable.
    #[error("malformed capabilities payload")]
    MalformedCapabilities,
    /// Neither side's advertised versions overlap in an acceptable way.
    #[error("no mutually acceptable protocol version")]
    NoMutualVersion,
    /// No reply arrived from the given peer before the deadline.
    #[error("negotiation with {0} timed out")]
    Timeout(SocketAddr),
}

/// This crate's result alias.
pub type Result<T> = std::result::Result<T, Error>;
