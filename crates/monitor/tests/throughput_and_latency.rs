use std::net::Ipv4Addr;
use std::time::Duration;

use meshwire_monitor::{Config, NetworkMonitor};
use meshwire_wire::PeerAddress;

fn peer(port: u16) -> PeerAddress {
    PeerAddress::V4(Ipv4Addr::new(192, 0, 2, 1), port)
}

#[test]
fn throughput_reflects_total_bytes_over_uptime() {
    let monitor = NetworkMonitor::new(Config::default());
    monitor.record_sent(peer(1), 1000);
    monitor.record_received(peer(1), 1000);
    let stats = monitor.global_stats();
    assert_eq!(stats.bytes_sent, 1000);
    assert_eq!(stats.bytes_received, 1000);
    assert!(stats.throughput_bps > 0.0);
}

#[test]
fn rtt_sample_drives_both_global_and_per_peer_latency() {
    let monitor = NetworkMonitor::new(Config::default());
    monitor.record_rtt(peer(1), Duration::from_millis(150));
    assert_eq!(monitor.global_stats().latency_ms, Some(150.0));
    assert_eq!(
        monitor.connection_snapshot(peer(1)).unwrap().rtt_ms,
        Some(150.0)
    );
}
