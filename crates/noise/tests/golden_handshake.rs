//! Exercises the crate's public surface the way an external caller would,
//! rather than through `#[cfg(test)]` internals.

use std::net::SocketAddr;

use meshwire_noise::{Config, NoiseSessionManager};
use zeroize::Zeroizing;

fn keypair() -> (Zeroizing<[u8; 32]>, [u8; 32]) {
    let pattern = "Noise_IK_25519_ChaChaPoly_BLAKE2s".parse().unwrap();
    let keypair = snow::Builder::new(pattern).generate_keypair().unwrap();
    let mut private = [0u8; 32];
    private.copy_from_slice(&keypair.private);
    let mut public = [0u8; 32];
    public.copy_from_slice(&keypair.public);
    (Zeroizing::new(private), public)
}

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

#[test]
fn two_managers_complete_a_handshake_and_exchange_ciphertext() {
    let (initiator_private, _) = keypair();
    let (responder_private, responder_public) = keypair();

    let initiator = NoiseSessionManager::new(initiator_private, Config::default());
    let responder = NoiseSessionManager::new(responder_private, Config::default());

    let initiator_addr = addr(100);
    let responder_addr = addr(101);

    initiator.register_peer_key(responder_addr, responder_public);
    let msg1 = initiator.initiate(responder_addr).unwrap();
    let msg2 = responder
        .process_handshake(initiator_addr, &msg1)
        .unwrap()
        .unwrap();
    assert!(initiator
        .process_handshake(responder_addr, &msg2)
        .unwrap()
        .is_none());

    let ciphertext = initiator.encrypt_for(responder_addr, b"hi").unwrap();
    let plaintext = responder.decrypt_from(initiator_addr, &ciphertext).unwrap();
    assert_eq!(plaintext, b"hi");
}

#[test]
fn retransmitted_reply_after_completion_requires_a_session_reset() {
    let (initiator_private, _) = keypair();
    let (responder_private, responder_public) = keypair();

    let initiator = NoiseSessionManager::new(initiator_private, Config::default());
    let responder = NoiseSessionManager::new(responder_private, Config::default());

    let initiator_addr = addr(102);
    let responder_addr = addr(103);

    initiator.register_peer_key(responder_addr, responder_public);
    let msg1 = initiator.initiate(responder_addr).unwrap();
    let msg2 = responder
        .process_handshake(initiator_addr, &msg1)
        .unwrap()
        .unwrap();
    initiator.process_handshake(responder_addr, &msg2).unwrap();
    assert!(initiator.is_ready(responder_addr));

    // A stray retransmit of message 2 must not silently re-complete the
    // already-complete session (spec.md: "rekey is out of scope; a new
    // session requires session reset first").
    let err = initiator.process_handshake(responder_addr, &msg2).unwrap_err();
    assert!(err.to_string().contains("already completed"));
    assert!(initiator.is_ready(responder_addr));

    initiator.reset_session(responder_addr);
    assert!(!initiator.has_session(responder_addr));
}
