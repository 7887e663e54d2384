//! IK handshake driving, one role per side.
//!
//! `Noise_IK_25519_ChaChaPoly_BLAKE2s`. The initiator already knows the
//! responder's static public key, so the handshake completes in two
//! messages: `-> e, es, s, ss` then `<- e, ee, se`.

use snow::{Builder, HandshakeState};
use zeroize::Zeroizing;

use crate::session::NoiseSession;
use crate::{Error, Result};

const NOISE_PATTERN: &str = "Noise_IK_25519_ChaChaPoly_BLAKE2s";

/// Maximum size of one handshake message buffer.
const MAX_HANDSHAKE_MSG_SIZE: usize = 2048;

/// Drives the initiator side of an IK handshake.
pub struct HandshakeInitiator {
    state: Option<HandshakeState>,
}

impl HandshakeInitiator {
    /// Builds an initiator that already knows the responder's static public
    /// key, as IK requires.
    pub fn new(local_private_key: &Zeroizing<[u8; 32]>, remote_public_key: &[u8; 32]) -> Result<Self> {
        let builder = Builder::new(NOISE_PATTERN.parse().expect("pattern string is valid"));
        let state = builder
            .local_private_key(local_private_key.as_ref())
            .remote_public_key(remote_public_key)
            .build_initiator()?;
        Ok(Self { state: Some(state) })
    }

    /// Produces the first handshake message: `-> e, es, s, ss`.
    pub fn write_message_1(&mut self) -> Result<Vec<u8>> {
        let state = self.state.as_mut().expect("state present before completion");
        let mut buf = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        let len = state.write_message(&[], &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Processes the responder's second message `<- e, ee, se` and
    /// transitions into an established [`NoiseSession`].
    pub fn read_message_2(mut self, message: &[u8]) -> Result<NoiseSession> {
        let mut state = self.state.take().expect("state present before completion");
        let mut buf = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        state.read_message(message, &mut buf)?;
        let transport = state.into_transport_mode()?;
        Ok(NoiseSession::new(transport))
    }
}

/// Drives the responder side of an IK handshake.
pub struct HandshakeResponder {
    state: Option<HandshakeState>,
}

impl HandshakeResponder {
    /// Builds a responder. The initiator's static key is learned during the
    /// handshake itself.
    pub fn new(local_private_key: &Zeroizing<[u8; 32]>) -> Result<Self> {
        let builder = Builder::new(NOISE_PATTERN.parse().expect("pattern string is valid"));
        let state = builder
            .local_private_key(local_private_key.as_ref())
            .build_responder()?;
        Ok(Self { state: Some(state) })
    }

    /// Processes the initiator's first message `-> e, es, s, ss`.
    pub fn read_message_1(&mut self, message: &[u8]) -> Result<()> {
        let state = self.state.as_mut().expect("state present before completion");
        let mut buf = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        state.read_message(message, &mut buf)?;
        Ok(())
    }

    /// The initiator's static public key, available only after
    /// [`HandshakeResponder::read_message_1`] has processed their first
    /// message.
    #[must_use]
    pub fn remote_static(&self) -> Option<[u8; 32]> {
        self.state.as_ref()?.get_remote_static().map(|bytes| {
            let mut out = [0u8; 32];
            out.copy_from_slice(bytes);
            out
        })
    }

    /// Produces the second handshake message `<- e, ee, se` and transitions
    /// into an established [`NoiseSession`].
    pub fn write_message_2(mut self) -> Result<(Vec<u8>, NoiseSession)> {
        let mut state = self.state.take().expect("state present before completion");
        let mut buf = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        let len = state.write_message(&[], &mut buf)?;
        buf.truncate(len);
        let transport = state.into_transport_mode()?;
        Ok((buf, NoiseSession::new(transport)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (Zeroizing<[u8; 32]>, [u8; 32]) {
        let keypair = snow::Builder::new(NOISE_PATTERN.parse().unwrap())
            .generate_keypair()
            .unwrap();
        let mut private = [0u8; 32];
        private.copy_from_slice(&keypair.private);
        let mut public = [0u8; 32];
        public.copy_from_slice(&keypair.public);
        (Zeroizing::new(private), public)
    }

    #[test]
    fn ik_handshake_completes_in_two_messages() {
        let (responder_private, responder_public) = keypair();
        let (initiator_private, _initiator_public) = keypair();

        let mut initiator =
            HandshakeInitiator::new(&initiator_private, &responder_public).unwrap();
        let mut responder = HandshakeResponder::new(&responder_private).unwrap();

        let msg1 = initiator.write_message_1().unwrap();
        responder.read_message_1(&msg1).unwrap();
        assert!(responder.remote_static().is_some());

        let (msg2, mut responder_session) = responder.write_message_2().unwrap();
        let mut initiator_session = initiator.read_message_2(&msg2).unwrap();

        let ciphertext = initiator_session.encrypt(b"hello").unwrap();
        let plaintext = responder_session.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn responder_learns_initiator_static_key() {
        let (responder_private, responder_public) = keypair();
        let (initiator_private, initiator_public) = keypair();

        let mut initiator =
            HandshakeInitiator::new(&initiator_private, &responder_public).unwrap();
        let mut responder = HandshakeResponder::new(&responder_private).unwrap();

        let msg1 = initiator.write_message_1().unwrap();
        responder.read_message_1(&msg1).unwrap();

        assert_eq!(responder.remote_static(), Some(initiator_public));
    }
}
