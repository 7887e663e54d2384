//! Logical connection identifiers.

use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHasher;

/// Identifies one [`crate::Connection`] for the lifetime of the multiplexer
/// that created it.
///
/// Derived from the peer's source address mixed with a monotonically
/// increasing counter, so a later connection from the same address (e.g.
/// after a prior one was reaped) never aliases an earlier id still held by
/// a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// Produces fresh, non-aliasing [`ConnectionId`]s.
#[derive(Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    /// Creates a generator starting its counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the next id for `addr`.
    pub fn next(&self, addr: SocketAddr) -> ConnectionId {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut hasher = FxHasher::default();
        addr.hash(&mut hasher);
        let addr_hash = hasher.finish();
        ConnectionId(addr_hash ^ counter)
    }
}
