//! Minimal STUN (RFC 5389) binding client for reflexive address discovery.
//!
//! # Overview
//!
//! [`discover_reflexive`] sends a binding request to each of a list of
//! public STUN servers in turn, stopping at the first one that answers
//! within its per-server timeout. Only the subset of RFC 5389 needed for
//! one-shot reflexive-address discovery is implemented: binding
//! request/response, the magic cookie, XOR-MAPPED-ADDRESS (preferred) and
//! MAPPED-ADDRESS (fallback) parsing. Authentication, fragmentation and the
//! TURN/ICE extensions are out of scope.
//!
//! # Errors
//!
//! Each per-server attempt can fail independently; [`discover_reflexive`]
//! only returns an error once every configured server has failed.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod client;
mod message;

pub use client::{discover_reflexive, Config};
pub use message::MAGIC_COOKIE;

use thiserror::Error;

/// Errors raised by the STUN client.
#[derive(Debug, Error)]
pub enum Error {
    /// No configured server produced a usable response.
    #[error("no STUN server responded within the configured timeout")]
    NoServerResponded,
    /// A response's magic cookie or transaction ID did not match the
    /// request it was supposedly answering.
    #[error("STUN response did not match the outstanding transaction")]
    TransactionMismatch,
    /// A response was too short or otherwise structurally invalid.
    #[error("malformed STUN message")]
    MalformedMessage,
    /// The response contained neither XOR-MAPPED-ADDRESS nor
    /// MAPPED-ADDRESS.
    #[error("STUN response carried no mapped address attribute")]
    NoMappedAddress,
    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;
