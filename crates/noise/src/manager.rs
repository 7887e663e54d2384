//! Per-peer Noise session lifecycle: registration, handshake driving,
//! encrypted send/receive and periodic reaping.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use rustc_hash::FxBuildHasher;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::handshake::{HandshakeInitiator, HandshakeResponder};
use crate::session::NoiseSession;
use crate::{Error, Result};

/// Where a peer's session currently sits in the handshake lifecycle.
pub enum SessionState {
    /// We sent the first handshake message and are waiting for the
    /// responder's reply. Only reached by the initiating side.
    InitiatorWaitResponse(HandshakeInitiator),
    /// The handshake completed; `session` is ready for encrypt/decrypt.
    Complete(NoiseSession),
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::InitiatorWaitResponse(_) => write!(f, "InitiatorWaitResponse"),
            SessionState::Complete(_) => write!(f, "Complete"),
        }
    }
}

struct SessionEntry {
    state: Mutex<Option<SessionState>>,
    created_at: Instant,
    last_activity: Mutex<Instant>,
}

impl SessionEntry {
    fn touch(&self) {
        *self.last_activity.lock().expect("last_activity lock poisoned") = Instant::now();
    }
}

/// Owns every peer's Noise session and the background reaper that evicts
/// stale ones.
///
/// The session map is one [`RwLock`]; each entry carries its own
/// [`Mutex`] so that driving one peer's handshake or encrypting its traffic
/// never blocks another peer's entry.
pub struct NoiseSessionManager {
    local_private_key: Zeroizing<[u8; 32]>,
    sessions: RwLock<HashMap<SocketAddr, Arc<SessionEntry>, FxBuildHasher>>,
    remote_keys: RwLock<HashMap<SocketAddr, [u8; 32], FxBuildHasher>>,
    config: Config,
    reaping: std::sync::atomic::AtomicBool,
}

impl NoiseSessionManager {
    /// Builds a manager for the local node's Noise identity.
    #[must_use]
    pub fn new(local_private_key: Zeroizing<[u8; 32]>, config: Config) -> Self {
        Self {
            local_private_key,
            sessions: RwLock::new(HashMap::default()),
            remote_keys: RwLock::new(HashMap::default()),
            config,
            reaping: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Records `addr`'s static public key so a later [`initiate`] can build
    /// an IK handshake toward it.
    ///
    /// [`initiate`]: NoiseSessionManager::initiate
    pub fn register_peer_key(&self, addr: SocketAddr, public_key: [u8; 32]) {
        self.remote_keys
            .write()
            .expect("remote_keys lock poisoned")
            .insert(addr, public_key);
    }

    /// Starts a handshake toward `addr` as the initiator, returning the
    /// type-250 message payload to send. Fails if `addr`'s key was never
    /// registered via [`register_peer_key`].
    ///
    /// [`register_peer_key`]: NoiseSessionManager::register_peer_key
    pub fn initiate(&self, addr: SocketAddr) -> Result<Vec<u8>> {
        let remote_key = *self
            .remote_keys
            .read()
            .expect("remote_keys lock poisoned")
            .get(&addr)
            .ok_or(Error::NoSession(addr))?;

        let mut initiator = HandshakeInitiator::new(&self.local_private_key, &remote_key)?;
        let message = initiator.write_message_1()?;

        let entry = Arc::new(SessionEntry {
            state: Mutex::new(Some(SessionState::InitiatorWaitResponse(initiator))),
            created_at: Instant::now(),
            last_activity: Mutex::new(Instant::now()),
        });
        self.sessions
            .write()
            .expect("sessions lock poisoned")
            .insert(addr, entry);
        Ok(message)
    }

    /// Processes an inbound type-250 handshake packet from `addr`.
    ///
    /// If no session exists yet, `addr` is treated as an inbound IK
    /// handshake and we act as responder, returning `Some(reply)` to send
    /// back. If we are mid-initiation, `message` is treated as the
    /// responder's reply and completes the handshake, returning `None`.
    /// Fails with [`Error::HandshakeAlreadyComplete`] if `addr`'s session
    /// has already finished — rekeying in place is out of scope, so the
    /// caller must [`Self::reset_session`] first.
    pub fn process_handshake(&self, addr: SocketAddr, message: &[u8]) -> Result<Option<Vec<u8>>> {
        let existing = self
            .sessions
            .read()
            .expect("sessions lock poisoned")
            .get(&addr)
            .cloned();

        match existing {
            None => {
                let mut responder = HandshakeResponder::new(&self.local_private_key)?;
                responder.read_message_1(message)?;
                if let Some(remote_static) = responder.remote_static() {
                    self.remote_keys
                        .write()
                        .expect("remote_keys lock poisoned")
                        .insert(addr, remote_static);
                }
                let (reply, session) = responder.write_message_2()?;
                let entry = Arc::new(SessionEntry {
                    state: Mutex::new(Some(SessionState::Complete(session))),
                    created_at: Instant::now(),
                    last_activity: Mutex::new(Instant::now()),
                });
                self.sessions
                    .write()
                    .expect("sessions lock poisoned")
                    .insert(addr, entry);
                Ok(Some(reply))
            }
            Some(entry) => {
                let mut state = entry.state.lock().expect("session lock poisoned");
                match state.take().expect("entry state is never left empty") {
                    SessionState::InitiatorWaitResponse(initiator) => {
                        let session = initiator.read_message_2(message)?;
                        *state = Some(SessionState::Complete(session));
                        entry.touch();
                        Ok(None)
                    }
                    complete @ SessionState::Complete(_) => {
                        *state = Some(complete);
                        Err(Error::HandshakeAlreadyComplete(addr))
                    }
                }
            }
        }
    }

    /// Encrypts `plaintext` for `addr` into a transport-ready ciphertext.
    /// Fails with [`Error::HandshakeIncomplete`] if the handshake has not
    /// finished yet; callers that want to send in the clear instead must
    /// check [`Config::allow_unencrypted_fallback`] and
    /// [`NoiseSessionManager::is_ready`] themselves before calling this.
    pub fn encrypt_for(&self, addr: SocketAddr, plaintext: &[u8]) -> Result<Vec<u8>> {
        let entry = self
            .sessions
            .read()
            .expect("sessions lock poisoned")
            .get(&addr)
            .cloned()
            .ok_or(Error::NoSession(addr))?;

        entry.touch();
        let mut state = entry.state.lock().expect("session lock poisoned");
        match state.as_mut().expect("entry state is never left empty") {
            SessionState::Complete(session) => Ok(session.encrypt(plaintext)?),
            SessionState::InitiatorWaitResponse(_) => Err(Error::HandshakeIncomplete(addr)),
        }
    }

    /// Decides whether `addr` may be sent to unencrypted right now: either a
    /// ready session exists (so the caller should prefer encryption
    /// anyway), or none exists yet and [`Config::allow_unencrypted_fallback`]
    /// permits bypassing encryption while the handshake is outstanding.
    #[must_use]
    pub fn may_send_unencrypted(&self, addr: SocketAddr) -> bool {
        self.config.allow_unencrypted_fallback && !self.is_ready(addr)
    }

    /// Decrypts an inbound type-251 message from `addr`.
    pub fn decrypt_from(&self, addr: SocketAddr, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let entry = self
            .sessions
            .read()
            .expect("sessions lock poisoned")
            .get(&addr)
            .cloned()
            .ok_or(Error::NoSession(addr))?;

        entry.touch();
        let mut state = entry.state.lock().expect("session lock poisoned");
        match &mut *state {
            SessionState::Complete(session) => Ok(session.decrypt(ciphertext)?),
            SessionState::InitiatorWaitResponse(_) => Err(Error::HandshakeIncomplete(addr)),
        }
    }

    /// Whether any session entry exists for `addr`, complete or not.
    /// Callers use this to avoid re-initiating a handshake that is already
    /// in flight.
    #[must_use]
    pub fn has_session(&self, addr: SocketAddr) -> bool {
        self.sessions.read().expect("sessions lock poisoned").contains_key(&addr)
    }

    /// Whether `addr` has a completed, ready-to-use session.
    #[must_use]
    pub fn is_ready(&self, addr: SocketAddr) -> bool {
        self.sessions
            .read()
            .expect("sessions lock poisoned")
            .get(&addr)
            .is_some_and(|entry| matches!(*entry.state.lock().expect("session lock poisoned"), SessionState::Complete(_)))
    }

    /// Drops `addr`'s session entirely, whatever state it is in.
    pub fn close(&self, addr: SocketAddr) {
        self.sessions.write().expect("sessions lock poisoned").remove(&addr);
    }

    /// Forces a fresh handshake with `addr` by dropping any existing
    /// session. The next [`initiate`] or inbound handshake packet starts
    /// clean.
    ///
    /// [`initiate`]: NoiseSessionManager::initiate
    pub fn reset_session(&self, addr: SocketAddr) {
        self.close(addr);
    }

    /// Number of sessions currently tracked, in any state.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().expect("sessions lock poisoned").len()
    }

    /// Starts the background reaper on a dedicated thread. A second call on
    /// a manager whose reaper is already running is a no-op.
    pub fn start_reaper(self: &Arc<Self>) {
        if self
            .reaping
            .compare_exchange(
                false,
                true,
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }
        let manager = Arc::clone(self);
        thread::spawn(move || manager.reap_loop());
    }

    fn reap_loop(&self) {
        loop {
            thread::sleep(self.config.reap_interval);
            self.reap_once();
        }
    }

    fn reap_once(&self) {
        let now = Instant::now();
        let mut stale = Vec::new();
        {
            let sessions = self.sessions.read().expect("sessions lock poisoned");
            for (addr, entry) in sessions.iter() {
                let is_stale = match &*entry.state.lock().expect("session lock poisoned") {
                    SessionState::InitiatorWaitResponse(_) => {
                        now.duration_since(entry.created_at) > self.config.handshake_timeout
                    }
                    SessionState::Complete(_) => {
                        let last = *entry.last_activity.lock().expect("last_activity lock poisoned");
                        now.duration_since(last) > self.config.session_idle_timeout
                    }
                };
                if is_stale {
                    stale.push(*addr);
                }
            }
        }
        if stale.is_empty() {
            return;
        }
        let mut sessions = self.sessions.write().expect("sessions lock poisoned");
        for addr in stale {
            sessions.remove(&addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn full_handshake_leaves_both_sides_ready() {
        let (initiator_private, _initiator_public) = keypair();
        let (responder_private, responder_public) = keypair();

        let initiator_mgr = NoiseSessionManager::new(initiator_private, Config::default());
        let responder_mgr = NoiseSessionManager::new(responder_private, Config::default());

        let initiator_addr = addr(1);
        let responder_addr = addr(2);

        initiator_mgr.register_peer_key(responder_addr, responder_public);
        let msg1 = initiator_mgr.initiate(responder_addr).unwrap();

        let msg2 = responder_mgr
            .process_handshake(initiator_addr, &msg1)
            .unwrap()
            .expect("responder replies with message 2");

        assert!(initiator_mgr
            .process_handshake(responder_addr, &msg2)
            .unwrap()
            .is_none());

        assert!(initiator_mgr.is_ready(responder_addr));
        assert!(responder_mgr.is_ready(initiator_addr));

        let ciphertext = initiator_mgr
            .encrypt_for(responder_addr, b"hello")
            .unwrap();
        let plaintext = responder_mgr
            .decrypt_from(initiator_addr, &ciphertext)
            .unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn encrypting_before_handshake_completes_is_rejected_by_default() {
        let (initiator_private, _) = keypair();
        let (_responder_private, responder_public) = keypair();
        let mgr = NoiseSessionManager::new(initiator_private, Config::default());
        let responder_addr = addr(3);
        mgr.register_peer_key(responder_addr, responder_public);
        mgr.initiate(responder_addr).unwrap();

        let err = mgr.encrypt_for(responder_addr, b"too early").unwrap_err();
        assert!(matches!(err, Error::HandshakeIncomplete(_)));
        assert!(!mgr.may_send_unencrypted(responder_addr));
    }

    #[test]
    fn unencrypted_fallback_allowed_only_when_configured_and_not_ready() {
        let (initiator_private, _) = keypair();
        let (_responder_private, responder_public) = keypair();
        let config = Config {
            allow_unencrypted_fallback: true,
            ..Config::default()
        };
        let mgr = NoiseSessionManager::new(initiator_private, config);
        let responder_addr = addr(7);
        mgr.register_peer_key(responder_addr, responder_public);
        mgr.initiate(responder_addr).unwrap();

        assert!(mgr.may_send_unencrypted(responder_addr));
    }

    #[test]
    fn initiate_without_registered_key_fails() {
        let (private, _) = keypair();
        let mgr = NoiseSessionManager::new(private, Config::default());
        let err = mgr.initiate(addr(4)).unwrap_err();
        assert!(matches!(err, Error::NoSession(_)));
    }

    #[test]
    fn second_handshake_message_for_a_complete_session_is_rejected() {
        let (initiator_private, _initiator_public) = keypair();
        let (responder_private, responder_public) = keypair();

        let initiator_mgr = NoiseSessionManager::new(initiator_private, Config::default());
        let responder_mgr = NoiseSessionManager::new(responder_private, Config::default());

        let initiator_addr = addr(8);
        let responder_addr = addr(9);

        initiator_mgr.register_peer_key(responder_addr, responder_public);
        let msg1 = initiator_mgr.initiate(responder_addr).unwrap();
        let msg2 = responder_mgr
            .process_handshake(initiator_addr, &msg1)
            .unwrap()
            .expect("responder replies with message 2");
        assert!(initiator_mgr
            .process_handshake(responder_addr, &msg2)
            .unwrap()
            .is_none());
        assert!(initiator_mgr.is_ready(responder_addr));

        // A stray retransmit of the responder's message after completion
        // must not be silently accepted; the caller needs to reset first.
        let err = initiator_mgr
            .process_handshake(responder_addr, &msg2)
            .unwrap_err();
        assert!(matches!(err, Error::HandshakeAlreadyComplete(a) if a == responder_addr));
        assert!(initiator_mgr.is_ready(responder_addr));

        initiator_mgr.reset_session(responder_addr);
        assert!(!initiator_mgr.has_session(responder_addr));
    }

    #[test]
    fn reset_session_drops_state_for_a_fresh_handshake() {
        let (initiator_private, _) = keypair();
        let (_responder_private, responder_public) = keypair();
        let mgr = NoiseSessionManager::new(initiator_private, Config::default());
        let responder_addr = addr(5);
        mgr.register_peer_key(responder_addr, responder_public);
        mgr.initiate(responder_addr).unwrap();
        assert_eq!(mgr.session_count(), 1);
        mgr.reset_session(responder_addr);
        assert_eq!(mgr.session_count(), 0);
    }

    #[test]
    fn reaper_evicts_stale_incomplete_handshakes() {
        let (initiator_private, _) = keypair();
        let (_responder_private, responder_public) = keypair();
        let config = Config {
            handshake_timeout: Duration::from_millis(10),
            ..Config::default()
        };
        let mgr = NoiseSessionManager::new(initiator_private, config);
        let responder_addr = addr(6);
        mgr.register_peer_key(responder_addr, responder_public);
        mgr.initiate(responder_addr).unwrap();
        assert_eq!(mgr.session_count(), 1);

        thread::sleep(Duration::from_millis(20));
        mgr.reap_once();
        assert_eq!(mgr.session_count(), 0);
    }
}
