//! A single logical connection tracked by the multiplexer.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::id::ConnectionId;
use crate::stats::ConnectionStats;
use crate::state::ConnectionState;

/// One logical connection multiplexed over a shared datagram endpoint.
///
/// Byte/packet counters use atomics so the hot send/receive path never
/// takes a lock; `state` and `session_data` are small and mutated rarely
/// enough that a `Mutex` is simpler than trying to make them lock-free too.
pub struct Connection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    state: Mutex<ConnectionState>,
    created_at: Instant,
    last_activity: Mutex<Instant>,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    error_count: AtomicU64,
    session_data: Mutex<Option<Box<dyn Any + Send + Sync>>>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, remote_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            remote_addr,
            state: Mutex::new(ConnectionState::Idle),
            created_at: now,
            last_activity: Mutex::new(now),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            session_data: Mutex::new(None),
        }
    }

    /// This connection's identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The peer address this connection routes to.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("connection state lock poisoned")
    }

    /// Transitions to a new state and refreshes the activity timestamp.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("connection state lock poisoned") = state;
        self.touch();
    }

    /// Replaces the opaque session-data pointer attached to this connection.
    pub fn set_session_data(&self, data: Box<dyn Any + Send + Sync>) {
        *self.session_data.lock().expect("session data lock poisoned") = Some(data);
    }

    /// Refreshes the last-activity timestamp to now.
    pub fn touch(&self) {
        *self.last_activity.lock().expect("connection state lock poisoned") = Instant::now();
    }

    /// Records `len` bytes sent as one outbound packet.
    pub fn record_sent(&self, len: usize) {
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Records `len` bytes received as one inbound packet.
    pub fn record_received(&self, len: usize) {
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    /// Records one processing error (e.g. a packet this connection could
    /// not route or decode).
    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// How long since this connection last saw traffic or a state change.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .expect("connection state lock poisoned")
            .elapsed()
    }

    /// Whether this connection is both in a terminal state and has been
    /// inactive for at least `idle_timeout`.
    #[must_use]
    pub fn is_reapable(&self, idle_timeout: Duration) -> bool {
        self.state().is_terminal() && self.idle_for() >= idle_timeout
    }

    /// A point-in-time snapshot of this connection's counters, taken
    /// without holding any lock the caller would need.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            id: self.id,
            remote_addr: self.remote_addr,
            state: self.state(),
            created_at: self.created_at,
            idle_for: self.idle_for(),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let addr = "127.0.0.1:9000".parse().unwrap();
        let id = crate::id::IdGenerator::new().next(addr);
        Connection::new(id, addr)
    }

    #[test]
    fn fresh_connection_starts_idle_and_not_reapable() {
        let c = conn();
        assert_eq!(c.state(), ConnectionState::Idle);
        assert!(!c.is_reapable(Duration::ZERO));
    }

    #[test]
    fn terminal_state_past_idle_timeout_is_reapable() {
        let c = conn();
        c.set_state(ConnectionState::Disconnected);
        std::thread::sleep(Duration::from_millis(5));
        assert!(c.is_reapable(Duration::from_millis(1)));
    }

    #[test]
    fn counters_accumulate_across_records() {
        let c = conn();
        c.record_sent(10);
        c.record_sent(5);
        c.record_received(3);
        let snapshot = c.snapshot();
        assert_eq!(snapshot.bytes_sent, 15);
        assert_eq!(snapshot.packets_sent, 2);
        assert_eq!(snapshot.bytes_received, 3);
        assert_eq!(snapshot.packets_received, 1);
    }
}
