//! Blocking await/complete plumbing for a single round of version
//! negotiation, built on `crossbeam_channel` rather than a future or a
//! busy-poll loop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::capabilities::Capabilities;
use crate::{Error, Result};

/// Tracks in-flight negotiations keyed by peer address.
///
/// A caller starts a negotiation with [`Negotiator::begin`], sends its own
/// capabilities packet out-of-band (this crate does not own a socket), and
/// blocks on the returned handle's [`PendingNegotiation::wait`]. Whoever
/// receives the peer's type-249 reply calls [`Negotiator::complete`], which
/// wakes the waiter.
#[derive(Default)]
pub struct Negotiator {
    pending: Mutex<HashMap<SocketAddr, Sender<Vec<u8>>>>,
}

/// A handle to a negotiation awaiting the peer's reply.
pub struct PendingNegotiation {
    peer: SocketAddr,
    rx: Receiver<Vec<u8>>,
}

impl Negotiator {
    /// Creates an empty negotiator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wait for `peer`'s negotiation reply. Replaces any prior
    /// pending wait for the same peer, dropping its sender (the earlier
    /// waiter, if still blocked, will see a disconnected channel).
    pub fn begin(&self, peer: SocketAddr) -> PendingNegotiation {
        let (tx, rx) = bounded(1);
        self.pending
            .lock()
            .expect("negotiator lock poisoned")
            .insert(peer, tx);
        PendingNegotiation { peer, rx }
    }

    /// Delivers a peer's type-249 reply payload to whichever [`PendingNegotiation`]
    /// is waiting on it, if any. Returns `true` if a waiter was found.
    pub fn complete(&self, peer: SocketAddr, payload: Vec<u8>) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("negotiator lock poisoned")
            .remove(&peer);
        match sender {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Drops any pending wait for `peer` without completing it.
    pub fn cancel(&self, peer: SocketAddr) {
        self.pending.lock().expect("negotiator lock poisoned").remove(&peer);
    }
}

impl PendingNegotiation {
    /// Blocks until the peer's capabilities arrive or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no reply arrives in time, and
    /// [`Error::MalformedCapabilities`] if the reply does not parse.
    pub fn wait(self, timeout: Duration) -> Result<Capabilities> {
        match self.rx.recv_timeout(timeout) {
            Ok(payload) => Capabilities::decode(&payload),
            Err(_) => Err(Error::Timeout(self.peer)),
        }
    }
}
