use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use meshwire_multiplex::{Config, Multiplexer};
use meshwire_transport::{DatagramEndpoint, Inbound};
use meshwire_wire::Packet;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[test]
fn two_multiplexers_exchange_a_packet_and_auto_create_connections() {
    let server_endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
    let server_addr = server_endpoint.local_addr().unwrap();
    let server = Multiplexer::new(server_endpoint.clone(), Config::default());

    let (tx, rx) = mpsc::channel();
    server.set_default_handler(Arc::new(move |inbound: Inbound| {
        let _ = tx.send(inbound);
    }));
    server_endpoint.start_receive_loop().unwrap();

    let client_endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
    let client = Multiplexer::new(client_endpoint, Config::default());
    let id = client.create_connection(server_addr);

    client.send_packet(id, &Packet::new(20, vec![7, 7])).unwrap();

    let inbound = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(inbound.packet.payload(), &[7, 7]);
    assert_eq!(server.list().len(), 1);

    server_endpoint.close();
}
