//! Per-peer traffic counters and the quality score derived from them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::LATENCY_EMA_ALPHA;

/// Counters and derived health for one peer connection.
///
/// Byte/packet/error counters are atomics so the hot send/receive path
/// never takes a lock; the RTT EMA and last-activity timestamp are small
/// enough that a `Mutex` is simpler than lock-free alternatives.
pub struct ConnectionHealth {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_lost: AtomicU64,
    errors: AtomicU64,
    rtt_ema_ms: Mutex<Option<f64>>,
    last_activity: Mutex<Instant>,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self {
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_lost: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            rtt_ema_ms: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
        }
    }
}

impl ConnectionHealth {
    pub(crate) fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub(crate) fn record_loss(&self) {
        self.packets_lost.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rtt(&self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;
        let mut ema = self.rtt_ema_ms.lock().expect("rtt ema lock poisoned");
        *ema = Some(match *ema {
            Some(prev) => LATENCY_EMA_ALPHA * sample_ms + (1.0 - LATENCY_EMA_ALPHA) * prev,
            None => sample_ms,
        });
        self.touch();
    }

    fn touch(&self) {
        *self.last_activity.lock().expect("activity lock poisoned") = Instant::now();
    }

    /// How long since this connection last saw send/receive/RTT activity.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().expect("activity lock poisoned").elapsed()
    }

    /// Current RTT estimate in milliseconds, if at least one sample has
    /// been recorded.
    #[must_use]
    pub fn rtt_ms(&self) -> Option<f64> {
        *self.rtt_ema_ms.lock().expect("rtt ema lock poisoned")
    }

    /// Fraction of sent packets this peer never acknowledged receipt of,
    /// as tracked via [`crate::NetworkMonitor::record_loss`].
    #[must_use]
    pub fn loss_rate(&self) -> f64 {
        let sent = self.packets_sent.load(Ordering::Relaxed);
        if sent == 0 {
            return 0.0;
        }
        self.packets_lost.load(Ordering::Relaxed) as f64 / sent as f64
    }

    /// Errors per byte transferred (sent + received).
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        let total_bytes = self.bytes_sent.load(Ordering::Relaxed) + self.bytes_received.load(Ordering::Relaxed);
        if total_bytes == 0 {
            return 0.0;
        }
        self.errors.load(Ordering::Relaxed) as f64 / total_bytes as f64
    }

    /// Quality score in `[0, 100]`. Starts at 100; penalized by RTT above
    /// 100ms, packet loss, and the error rate, per `spec.md` §4.K.
    #[must_use]
    pub fn quality_score(&self) -> f64 {
        let mut score = 100.0;
        if let Some(rtt) = self.rtt_ms() {
            score -= (rtt - 100.0) / 10.0;
        }
        score -= 100.0 * self.loss_rate();
        score -= 1000.0 * self.error_rate();
        score.clamp(0.0, 100.0)
    }

    /// A point-in-time snapshot of this peer's counters.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_lost: self.packets_lost.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            rtt_ms: self.rtt_ms(),
            loss_rate: self.loss_rate(),
            error_rate: self.error_rate(),
            quality_score: self.quality_score(),
            idle_for: self.idle_for(),
        }
    }
}

/// A snapshot of one peer's counters and derived health, taken without
/// holding any lock the caller would need.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionSnapshot {
    /// Bytes sent to this peer.
    pub bytes_sent: u64,
    /// Bytes received from this peer.
    pub bytes_received: u64,
    /// Packets sent to this peer.
    pub packets_sent: u64,
    /// Packets sent to this peer presumed lost (see
    /// [`crate::NetworkMonitor::record_loss`]).
    pub packets_lost: u64,
    /// Packets received from this peer.
    pub packets_received: u64,
    /// Errors recorded against this peer.
    pub errors: u64,
    /// Current RTT EMA in milliseconds, if any sample has been recorded.
    pub rtt_ms: Option<f64>,
    /// Fraction of sent packets presumed lost.
    pub loss_rate: f64,
    /// Errors per byte transferred.
    pub error_rate: f64,
    /// Quality score in `[0, 100]`.
    pub quality_score: f64,
    /// How long since this peer last saw traffic.
    pub idle_for: Duration,
}
