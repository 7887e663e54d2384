//! Alert thresholds and smoothing parameters.

use std::time::Duration;

/// Smoothing factor for the exponential moving average RTT. Spec default:
/// 0.1 (new samples contribute 10% of the updated estimate).
pub const LATENCY_EMA_ALPHA: f64 = 0.1;

/// Minimum interval between recomputing cumulative throughput — cheap
/// enough to call on every stats read without re-deriving it from scratch
/// each time.
pub const THROUGHPUT_RECOMPUTE_INTERVAL: Duration = Duration::from_secs(1);

/// Thresholds [`crate::NetworkMonitor::check_alerts`] compares live
/// measurements against.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Global EMA latency above this (milliseconds) raises
    /// [`crate::Alert::HighLatency`].
    pub max_latency_ms: f64,
    /// Global packet loss fraction above this raises
    /// [`crate::Alert::HighLoss`].
    pub max_loss_fraction: f64,
    /// Cumulative throughput (bytes/sec) below this raises
    /// [`crate::Alert::LowThroughput`].
    pub min_throughput_bps: f64,
    /// A connection idle longer than this raises
    /// [`crate::Alert::ConnectionIdle`].
    pub connection_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_latency_ms: 1000.0,
            max_loss_fraction: 0.1,
            min_throughput_bps: 0.0,
            connection_timeout: Duration::from_secs(5 * 60),
        }
    }
}
