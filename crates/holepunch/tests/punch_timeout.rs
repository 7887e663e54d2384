use std::net::SocketAddr;
use std::time::Duration;

use meshwire_holepunch::{punch, Config, Outcome};

#[test]
fn punch_times_out_against_an_unreachable_peer() {
    let local: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let remote: SocketAddr = "127.0.0.1:1".parse().unwrap();
    let config = Config {
        probes: 1,
        interval: Duration::from_millis(10),
    };
    let outcome = punch(local, remote, &config).unwrap();
    assert_eq!(outcome, Outcome::Timeout);
}
