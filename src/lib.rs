//! Peer-to-peer Noise-IK network transport.
//!
//! # Overview
//!
//! `meshwire` wires the workspace's leaf crates into one object graph: a
//! [`transport::DatagramEndpoint`] carries bytes, [`noise`] turns peer
//! addresses into encrypted sessions via a one-round-trip Noise-IK
//! handshake, [`negotiation`] lets two peers agree on a protocol version
//! before that handshake starts, [`cascade`] finds a reachable path to a
//! peer across direct/UPnP/STUN/hole-punch/relay methods in priority
//! order, and [`monitor`] turns the traffic flowing through all of the
//! above into per-peer quality scores and threshold alerts. [`Endpoint`]
//! is the facade applications actually hold.
//!
//! Callers who want connection-id based routing on top of an already
//! encrypted link should build a [`multiplex::Multiplexer`] directly; see
//! [`Endpoint`]'s docs for why it is not folded into the facade itself.
//!
//! # Errors
//!
//! [`Error`] wraps every sub-crate's own error type plus one failure mode
//! specific to this facade: [`Endpoint::send`] rejecting a non-control
//! packet to a peer with no ready Noise session when unencrypted fallback
//! is disabled.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod config;
mod endpoint;

pub use config::Config;
pub use endpoint::Endpoint;

use std::net::SocketAddr;

/// The NAT traversal cascade, re-exported so callers can name a
/// [`cascade::Method`] or build a [`cascade::RelayHandle`] without a direct
/// dependency on `meshwire-cascade`.
pub use cascade;
/// Traffic counters, quality scoring and alerts.
pub use monitor;
/// Connection-id based routing over a shared datagram endpoint.
pub use multiplex;
/// Protocol version negotiation.
pub use negotiation;
/// Noise-IK handshake sessions.
pub use noise;
/// STUN reflexive address discovery.
pub use stun;
/// Datagram and stream transports.
pub use transport;
/// UDP hole punching.
pub use holepunch;
/// UPnP IGD port mapping.
pub use upnp;
/// Wire-level packet framing and address encoding.
pub use wire;

/// Errors raised by the [`Endpoint`] facade, unifying every sub-crate's own
/// error type plus the failure modes specific to composing them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying datagram transport rejected the operation.
    #[error(transparent)]
    Transport(#[from] transport::Error),
    /// The Noise subsystem rejected the operation.
    #[error(transparent)]
    Noise(#[from] noise::Error),
    /// Version negotiation failed.
    #[error(transparent)]
    Negotiation(#[from] negotiation::Error),
    /// Packet framing failed.
    #[error(transparent)]
    Wire(#[from] wire::Error),
    /// [`Endpoint::send`] was asked to deliver a non-control packet to a
    /// peer with no ready Noise session, and
    /// [`noise::Config::allow_unencrypted_fallback`] does not permit
    /// sending it in the clear instead.
    #[error("no ready session for {0} and unencrypted fallback is disabled")]
    HandshakeNotReady(SocketAddr),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;
