//! Threshold-driven alerts surfaced by [`crate::NetworkMonitor::check_alerts`].

use std::time::Duration;

use meshwire_wire::PeerAddress;

/// One threshold violation observed at the time [`crate::NetworkMonitor::check_alerts`]
/// was called.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alert {
    /// Global EMA latency exceeded the configured maximum.
    HighLatency {
        /// Observed latency in milliseconds.
        observed_ms: f64,
        /// The configured threshold.
        threshold_ms: f64,
    },
    /// Global packet loss fraction exceeded the configured maximum.
    HighLoss {
        /// Observed loss fraction in `[0, 1]`.
        observed: f64,
        /// The configured threshold.
        threshold: f64,
    },
    /// Cumulative throughput fell below the configured minimum.
    LowThroughput {
        /// Observed throughput in bytes/sec.
        observed_bps: f64,
        /// The configured threshold.
        threshold_bps: f64,
    },
    /// A specific peer has been idle longer than the configured timeout.
    ConnectionIdle {
        /// The idle peer.
        peer: PeerAddress,
        /// How long it has been idle.
        idle_for: Duration,
    },
    /// A specific peer's quality score fell below 50.
    LowQuality {
        /// The affected peer.
        peer: PeerAddress,
        /// Its current quality score.
        score: f64,
    },
}
