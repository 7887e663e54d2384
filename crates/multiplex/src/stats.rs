//! Point-in-time snapshots of per-connection and aggregate counters.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::id::ConnectionId;
use crate::state::ConnectionState;

/// A snapshot of one connection's counters and state.
#[derive(Clone, Debug)]
pub struct ConnectionStats {
    /// The connection this snapshot was taken from.
    pub id: ConnectionId,
    /// Its peer address.
    pub remote_addr: SocketAddr,
    /// Lifecycle state at snapshot time.
    pub state: ConnectionState,
    /// When the connection was created.
    pub created_at: Instant,
    /// How long it had been idle at snapshot time.
    pub idle_for: Duration,
    /// Bytes sent over this connection.
    pub bytes_sent: u64,
    /// Bytes received over this connection.
    pub bytes_received: u64,
    /// Packets sent over this connection.
    pub packets_sent: u64,
    /// Packets received over this connection.
    pub packets_received: u64,
    /// Errors recorded against this connection.
    pub error_count: u64,
}

/// A snapshot combining every connection's stats with workspace-wide
/// totals, taken under a single read lock so the numbers are consistent
/// with one another (no torn read across connections).
#[derive(Clone, Debug)]
pub struct AggregateStats {
    /// Per-connection snapshots, in no particular order.
    pub connections: Vec<ConnectionStats>,
    /// Total bytes sent across every tracked connection.
    pub total_bytes_sent: u64,
    /// Total bytes received across every tracked connection.
    pub total_bytes_received: u64,
    /// Total packets sent across every tracked connection.
    pub total_packets_sent: u64,
    /// Total packets received across every tracked connection.
    pub total_packets_received: u64,
    /// Inbound packets that matched no connection and no type handler.
    pub routing_errors: u64,
}

impl AggregateStats {
    pub(crate) fn from_connections(connections: Vec<ConnectionStats>, routing_errors: u64) -> Self {
        let total_bytes_sent = connections.iter().map(|c| c.bytes_sent).sum();
        let total_bytes_received = connections.iter().map(|c| c.bytes_received).sum();
        let total_packets_sent = connections.iter().map(|c| c.packets_sent).sum();
        let total_packets_received = connections.iter().map(|c| c.packets_received).sum();
        Self {
            connections,
            total_bytes_sent,
            total_bytes_received,
            total_packets_sent,
            total_packets_received,
            routing_errors,
        }
    }
}
