//! Traffic counters, per-peer quality scoring and threshold-driven alerts.
//!
//! # Overview
//!
//! A [`NetworkMonitor`] is a passive observer: every other component in the
//! workspace (the datagram/stream endpoints, the Noise session manager,
//! the multiplexer) calls its `record_*` methods as traffic flows, and the
//! monitor derives global and per-peer health from those samples. It never
//! touches a socket itself.
//!
//! Per-peer health is keyed by [`PeerAddress`] rather than any one
//! component's connection id, since the monitor sits above every transport
//! shape (datagram, stream, multiplexed) and peer address is the one
//! identifier they all share.
//!
//! Global latency uses an exponential moving average (α = 0.1, `spec.md`
//! §4.K); cumulative throughput is `total_bytes / uptime`, recomputed at
//! most once per second so repeated stats reads under load don't re-derive
//! it from scratch every call.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod alert;
mod config;
mod health;

pub use alert::Alert;
pub use config::Config;
pub use health::{ConnectionHealth, ConnectionSnapshot};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use meshwire_wire::PeerAddress;
use rustc_hash::FxHashMap;

use config::{LATENCY_EMA_ALPHA, THROUGHPUT_RECOMPUTE_INTERVAL};

/// A consistent snapshot of global counters and derived metrics.
#[derive(Clone, Copy, Debug)]
pub struct GlobalStats {
    /// Total bytes sent across every observed peer.
    pub bytes_sent: u64,
    /// Total bytes received across every observed peer.
    pub bytes_received: u64,
    /// Total packets sent across every observed peer.
    pub packets_sent: u64,
    /// Total packets received across every observed peer.
    pub packets_received: u64,
    /// Global RTT EMA in milliseconds, if any sample has been recorded.
    pub latency_ms: Option<f64>,
    /// Global packet loss fraction in `[0, 1]`.
    pub loss_rate: f64,
    /// Cumulative throughput in bytes/sec since the monitor was created.
    pub throughput_bps: f64,
    /// How long the monitor has been running.
    pub uptime: Duration,
}

struct ThroughputCache {
    last_computed: Instant,
    value: f64,
}

/// Tracks global and per-peer traffic counters, latency, loss, and derived
/// quality, raising alerts when configured thresholds are crossed.
pub struct NetworkMonitor {
    config: Config,
    started_at: Instant,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_lost: AtomicU64,
    latency_ema_ms: Mutex<Option<f64>>,
    throughput_cache: Mutex<ThroughputCache>,
    connections: RwLock<FxHashMap<PeerAddress, ConnectionHealth>>,
}

impl NetworkMonitor {
    /// Builds a monitor with the given alert thresholds, starting its
    /// uptime clock now.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let now = Instant::now();
        Self {
            config,
            started_at: now,
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_lost: AtomicU64::new(0),
            latency_ema_ms: Mutex::new(None),
            throughput_cache: Mutex::new(ThroughputCache {
                last_computed: now,
                value: 0.0,
            }),
            connections: RwLock::new(FxHashMap::default()),
        }
    }

    fn with_health<R>(&self, peer: PeerAddress, f: impl FnOnce(&ConnectionHealth) -> R) -> R {
        if let Some(health) = self.connections.read().expect("connections lock poisoned").get(&peer) {
            return f(health);
        }
        let mut connections = self.connections.write().expect("connections lock poisoned");
        let health = connections.entry(peer).or_default();
        f(health)
    }

    /// Records `bytes` sent to `peer`, updating both global and per-peer
    /// counters.
    pub fn record_sent(&self, peer: PeerAddress, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.with_health(peer, |health| health.record_sent(bytes));
    }

    /// Records `bytes` received from `peer`, updating both global and
    /// per-peer counters.
    pub fn record_received(&self, peer: PeerAddress, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.with_health(peer, |health| health.record_received(bytes));
    }

    /// Records a round-trip time sample for `peer`, folding it into both
    /// the global and that peer's exponential moving average.
    pub fn record_rtt(&self, peer: PeerAddress, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;
        let mut global = self.latency_ema_ms.lock().expect("latency ema lock poisoned");
        *global = Some(match *global {
            Some(prev) => LATENCY_EMA_ALPHA * sample_ms + (1.0 - LATENCY_EMA_ALPHA) * prev,
            None => sample_ms,
        });
        drop(global);
        self.with_health(peer, |health| health.record_rtt(sample));
    }

    /// Records one packet sent to `peer` presumed lost (e.g. a send that
    /// was never acknowledged within the caller's own retry window).
    pub fn record_loss(&self, peer: PeerAddress) {
        self.packets_lost.fetch_add(1, Ordering::Relaxed);
        self.with_health(peer, health::ConnectionHealth::record_loss);
    }

    /// Records one processing error attributed to `peer`.
    pub fn record_error(&self, peer: PeerAddress) {
        self.with_health(peer, health::ConnectionHealth::record_error);
    }

    /// This peer's current quality score in `[0, 100]`, or `None` if the
    /// monitor has never observed it.
    #[must_use]
    pub fn connection_quality(&self, peer: PeerAddress) -> Option<f64> {
        self.connections
            .read()
            .expect("connections lock poisoned")
            .get(&peer)
            .map(ConnectionHealth::quality_score)
    }

    /// A snapshot of one peer's counters, or `None` if never observed.
    #[must_use]
    pub fn connection_snapshot(&self, peer: PeerAddress) -> Option<ConnectionSnapshot> {
        self.connections
            .read()
            .expect("connections lock poisoned")
            .get(&peer)
            .map(ConnectionHealth::snapshot)
    }

    /// Every peer address the monitor has observed traffic for.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.connections.read().expect("connections lock poisoned").keys().copied().collect()
    }

    fn global_loss_rate(&self) -> f64 {
        let sent = self.packets_sent.load(Ordering::Relaxed);
        if sent == 0 {
            return 0.0;
        }
        self.packets_lost.load(Ordering::Relaxed) as f64 / sent as f64
    }

    fn throughput_bps(&self) -> f64 {
        let mut cache = self.throughput_cache.lock().expect("throughput cache lock poisoned");
        if cache.last_computed.elapsed() < THROUGHPUT_RECOMPUTE_INTERVAL {
            return cache.value;
        }
        let total_bytes = self.bytes_sent.load(Ordering::Relaxed) + self.bytes_received.load(Ordering::Relaxed);
        let uptime = self.started_at.elapsed().as_secs_f64().max(1e-9);
        cache.value = total_bytes as f64 / uptime;
        cache.last_computed = Instant::now();
        cache.value
    }

    /// A consistent snapshot of every global counter and derived metric.
    #[must_use]
    pub fn global_stats(&self) -> GlobalStats {
        GlobalStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            latency_ms: *self.latency_ema_ms.lock().expect("latency ema lock poisoned"),
            loss_rate: self.global_loss_rate(),
            throughput_bps: self.throughput_bps(),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Evaluates every configured threshold against current measurements,
    /// returning one [`Alert`] per violation observed right now. Calling
    /// this repeatedly is expected — it is not edge-triggered, so a
    /// sustained violation reappears on every call until it clears.
    #[must_use]
    pub fn check_alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let global = self.global_stats();

        if let Some(latency_ms) = global.latency_ms {
            if latency_ms > self.config.max_latency_ms {
                alerts.push(Alert::HighLatency {
                    observed_ms: latency_ms,
                    threshold_ms: self.config.max_latency_ms,
                });
            }
        }
        if global.loss_rate > self.config.max_loss_fraction {
            alerts.push(Alert::HighLoss {
                observed: global.loss_rate,
                threshold: self.config.max_loss_fraction,
            });
        }
        if global.throughput_bps < self.config.min_throughput_bps {
            alerts.push(Alert::LowThroughput {
                observed_bps: global.throughput_bps,
                threshold_bps: self.config.min_throughput_bps,
            });
        }

        for (peer, health) in self.connections.read().expect("connections lock poisoned").iter() {
            let idle_for = health.idle_for();
            if idle_for > self.config.connection_timeout {
                alerts.push(Alert::ConnectionIdle {
                    peer: *peer,
                    idle_for,
                });
            }
            let score = health.quality_score();
            if score < 50.0 {
                alerts.push(Alert::LowQuality { peer: *peer, score });
            }
        }

        alerts
    }
}
