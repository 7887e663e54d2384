//! Noise-IK handshake sessions and the per-peer session manager.
//!
//! # Overview
//!
//! Every peer the transport talks to gets one [`handshake`]-driven IK
//! handshake (`Noise_IK_25519_ChaChaPoly_BLAKE2s`, built on [`snow`]) and,
//! once complete, one [`session::NoiseSession`] wrapping the resulting
//! transport keys. [`NoiseSessionManager`] is the object the rest of the
//! workspace actually talks to: it owns the peer-address-keyed session map,
//! drives both handshake roles against inbound type-250 packets, encrypts
//! outbound application packets into type-251 envelopes, and reaps sessions
//! that never complete a handshake or have gone idle.
//!
//! IK is a one-round-trip pattern: the initiator already knows the
//! responder's static public key (via [`NoiseSessionManager::register_peer_key`])
//! before the first message is sent, so there is no XX-style third
//! leg — two messages complete the handshake.
//!
//! # Design
//!
//! The session map is a single [`std::sync::RwLock`] keyed by peer address;
//! each entry additionally carries its own [`std::sync::Mutex`] so that
//! encrypting/decrypting one peer's traffic never blocks progress on
//! another peer's handshake. A background reaper thread wakes every thirty
//! seconds, takes a write lock only long enough to collect the addresses to
//! evict, and drops entries whose handshake has been incomplete for longer
//! than [`Config::handshake_timeout`] or whose transport session has been
//! idle for longer than [`Config::session_idle_timeout`].
//!
//! # Errors
//!
//! See [`Error`] for the full set of failure modes; most originate from
//! `snow` itself (malformed or replayed handshake/transport messages) or
//! from calling an operation against a peer with no session.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod config;
mod handshake;
mod manager;
mod session;

pub use config::Config;
pub use handshake::{HandshakeInitiator, HandshakeResponder};
pub use manager::{NoiseSessionManager, SessionState};
pub use session::NoiseSession;

use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised by the Noise subsystem.
#[derive(Debug, Error)]
pub enum Error {
    /// No session (in any state) exists for the given peer.
    #[error("no session for peer {0}")]
    NoSession(SocketAddr),
    /// The session exists but has not completed its handshake.
    #[error("handshake with {0} has not completed")]
    HandshakeIncomplete(SocketAddr),
    /// A fresh handshake message arrived for a peer whose session already
    /// completed. Rekeying in place is out of scope; the caller must
    /// [`NoiseSessionManager::reset_session`] before a new handshake can
    /// start.
    ///
    /// [`NoiseSessionManager::reset_session`]: crate::NoiseSessionManager::reset_session
    #[error("handshake with {0} already completed")]
    HandshakeAlreadyComplete(SocketAddr),
    /// A handshake or transport message failed underlying Noise processing.
    #[error("noise protocol error: {0}")]
    Protocol(#[from] snow::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;
