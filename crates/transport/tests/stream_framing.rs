use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use meshwire_transport::{Inbound, StreamEndpoint};
use meshwire_wire::Packet;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[test]
fn stream_endpoint_delivers_length_framed_packets() {
    let server = Arc::new(StreamEndpoint::bind(loopback()).unwrap());
    let addr = server.local_addr().unwrap();

    let (tx, rx) = mpsc::channel();
    server.register_handler(
        9,
        Arc::new(move |inbound: Inbound| {
            let _ = tx.send(inbound);
        }),
    );
    server.start_accept_loop().unwrap();

    let client = Arc::new(StreamEndpoint::bind(loopback()).unwrap());
    let packet = Packet::new(9, vec![4, 5, 6]);
    client.send_packet(addr, &packet).unwrap();

    let inbound = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(inbound.packet, packet);
    server.close();
    client.close();
}
