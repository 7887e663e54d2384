use std::net::SocketAddr;
use std::sync::Arc;

use meshwire_multiplex::{Config, ConnectionState, Multiplexer};
use meshwire_transport::DatagramEndpoint;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[test]
fn closed_connections_survive_by_id_until_reaped() {
    let endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
    let mux = Multiplexer::new(endpoint, Config::default());
    let id = mux.create_connection("127.0.0.1:9500".parse().unwrap());
    mux.close(id).unwrap();

    let conn = mux.get(id).unwrap();
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    // Still present until the idle timeout + a reap pass elapse.
    assert_eq!(mux.list().len(), 1);
}
