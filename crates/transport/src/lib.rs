//! Datagram and stream transports over raw sockets.
//!
//! # Overview
//!
//! This crate owns the two concrete socket shapes the rest of the workspace
//! builds on: a connectionless [`DatagramEndpoint`] (one UDP socket, many
//! correspondents) and a connection-oriented [`StreamEndpoint`] (one
//! listener, many accepted/dialed length-framed sessions). Neither type
//! knows anything about Noise handshakes, version negotiation or NAT
//! traversal — those are built on top, in sibling crates, by registering
//! [`PacketHandler`] implementations.
//!
//! # Design
//!
//! Each endpoint runs at most one receive loop, polling its socket with a
//! short read timeout so the loop can observe a close request without
//! blocking forever. Handler invocation happens on a freshly spawned thread
//! per inbound datagram/frame so a slow handler never stalls the receive
//! loop itself. Dispatch is a fixed 256-entry table indexed by the packet's
//! raw type byte, not a dynamic registry — closed dispatch over dynamic
//! dispatch across module boundaries.
//!
//! Endpoint handles hand out to callers are non-owning: closing the
//! endpoint flips an atomic flag, and any handle still held by a session
//! manager or multiplexer observes [`Error::EndpointClosed`] on its next use
//! rather than silently operating on a dead socket.
//!
//! # Errors
//!
//! All fallible operations return [`Result`]; socket-layer origin errors are
//! wrapped via `#[from] std::io::Error`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod datagram;
mod dispatch;
mod stream;

pub use datagram::DatagramEndpoint;
pub use dispatch::{DispatchTable, PacketHandler};
pub use stream::StreamEndpoint;

use std::net::SocketAddr;

use meshwire_wire::Packet;
use thiserror::Error;

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was attempted on an endpoint that has already been
    /// closed.
    #[error("endpoint is closed")]
    EndpointClosed,
    /// A datagram arrived larger than the endpoint's receive buffer and was
    /// dropped without dispatch.
    #[error("oversized datagram from {from} ({size} bytes, max {max})")]
    OversizedDatagram {
        /// The sender's address.
        from: SocketAddr,
        /// The datagram's actual size.
        size: usize,
        /// The configured maximum.
        max: usize,
    },
    /// A receive loop was started on an endpoint that already has one
    /// running.
    #[error("endpoint already has an active receive loop")]
    ReceiveLoopAlreadyRunning,
    /// Underlying packet framing error.
    #[error(transparent)]
    Wire(#[from] meshwire_wire::Error),
    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A received packet together with the address it arrived from.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// The sender's socket address.
    pub from: SocketAddr,
    /// The parsed packet.
    pub packet: Packet,
}
