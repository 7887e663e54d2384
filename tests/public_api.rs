use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use meshwire::transport::Inbound;
use meshwire::wire::Packet;
use meshwire::{Config, Endpoint};
use zeroize::Zeroizing;

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn keypair() -> (Zeroizing<[u8; 32]>, [u8; 32]) {
    let pattern = "Noise_IK_25519_ChaChaPoly_BLAKE2s".parse().unwrap();
    let keypair = snow::Builder::new(pattern).generate_keypair().unwrap();
    let mut private = [0u8; 32];
    private.copy_from_slice(&keypair.private);
    let mut public = [0u8; 32];
    public.copy_from_slice(&keypair.public);
    (Zeroizing::new(private), public)
}

#[test]
fn negotiate_then_handshake_then_exchange_encrypted_application_traffic() {
    let (a_private, a_public) = keypair();
    let (b_private, b_public) = keypair();
    let config = Config {
        bind_addr: loopback(),
        negotiation_timeout: Duration::from_secs(2),
        ..Config::default()
    };

    let a = Endpoint::bind(a_private, config.clone(), None).unwrap();
    let b = Endpoint::bind(b_private, config, None).unwrap();
    let a_addr = a.local_addr().unwrap();
    let b_addr = b.local_addr().unwrap();

    assert_eq!(a.negotiate(b_addr).unwrap(), meshwire::negotiation::ProtocolVersion::NoiseIK);

    a.register_peer_key(b_addr, b_public);
    b.register_peer_key(a_addr, a_public);

    // No explicit `initiate_handshake` call: `a`'s first `send` to `b_addr`
    // starts the handshake as a side effect, and this retry loop just
    // waits out the round trip.
    let deadline = Instant::now() + Duration::from_secs(2);
    while a.send(b_addr, &Packet::new(5, vec![1])).is_err() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let (tx, rx) = mpsc::channel();
    b.register_app_handler(
        5,
        std::sync::Arc::new(move |inbound: Inbound| {
            let _ = tx.send(inbound.packet);
        }),
    );

    a.send(b_addr, &Packet::new(5, vec![0xDE, 0xAD])).unwrap();
    let received = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(received.payload(), &[0xDE, 0xAD]);

    let stats = a.global_stats();
    assert!(stats.packets_sent >= 3);

    a.close();
    b.close();
}

#[test]
fn closing_the_endpoint_is_observable_as_a_transport_error() {
    let config = Config {
        bind_addr: loopback(),
        ..Config::default()
    };
    let (private, _) = keypair();
    let endpoint = Endpoint::bind(private, config, None).unwrap();
    endpoint.close();

    let remote: SocketAddr = "127.0.0.1:1".parse().unwrap();
    let err = endpoint.negotiate(remote).unwrap_err();
    assert!(matches!(err, meshwire::Error::Transport(meshwire::transport::Error::EndpointClosed)));
}
