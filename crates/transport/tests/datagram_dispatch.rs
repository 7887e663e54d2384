use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use meshwire_transport::{DatagramEndpoint, Inbound};
use meshwire_wire::Packet;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

#[test]
fn datagram_endpoint_delivers_registered_packet_types() {
    let receiver = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
    let addr = receiver.local_addr().unwrap();

    let (tx, rx) = mpsc::channel();
    receiver.register_handler(
        5,
        Arc::new(move |inbound: Inbound| {
            let _ = tx.send(inbound);
        }),
    );
    receiver.start_receive_loop().unwrap();

    let sender = DatagramEndpoint::bind(loopback()).unwrap();
    let packet = Packet::new(5, vec![1, 2, 3]);
    sender.send(addr, &packet.serialize().unwrap()).unwrap();

    let inbound = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(inbound.packet, packet);
    receiver.close();
}
