//! The root object graph: one [`Endpoint`] per local node, wiring a
//! [`transport::DatagramEndpoint`] to Noise sessions, version negotiation,
//! the NAT traversal cascade and the network monitor.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use negotiation::{Capabilities, Negotiator, ProtocolVersion};
use noise::NoiseSessionManager;
use transport::{DatagramEndpoint, DispatchTable, Inbound, PacketHandler};
use wire::{Packet, PeerAddress};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::{Error, Result};

/// One peer-to-peer node: a bound socket plus every layer built on top of it.
///
/// Application code talks to the workspace almost entirely through this
/// type. [`Endpoint::send`] implements the data-flow `spec.md` §2
/// describes: type 249 (version negotiation) and type 250 (Noise
/// handshake) travel in the clear, everything else is encrypted through a
/// complete Noise session — or, if [`noise::Config::allow_unencrypted_fallback`]
/// permits it, sent in the clear while the handshake is still outstanding.
///
/// [`Endpoint`] deliberately does not itself own a [`multiplex::Multiplexer`]:
/// a multiplexer claims every dispatch slot of the [`DatagramEndpoint`] it
/// is built over for its own connection-id routing, which would fight with
/// the handshake/negotiation handlers this type installs on packet types
/// 249-251. Callers who want connection-id based routing on top of an
/// already-established, encrypted peer should build a [`multiplex::Multiplexer`]
/// over a second, separately bound [`DatagramEndpoint`] instead.
pub struct Endpoint {
    datagram: Arc<DatagramEndpoint>,
    noise: Arc<NoiseSessionManager>,
    negotiator: Arc<Negotiator>,
    cascade: Arc<cascade::Cascade>,
    monitor: Arc<monitor::NetworkMonitor>,
    app_dispatch: RwLock<DispatchTable>,
    config: Config,
}

impl Endpoint {
    /// Binds a new endpoint at `config.bind_addr` under the given Noise
    /// identity, registers the negotiation/handshake handlers, and starts
    /// the receive loop and Noise reaper. The returned endpoint is ready to
    /// send and receive traffic immediately.
    pub fn bind(local_private_key: Zeroizing<[u8; 32]>, config: Config, relay: Option<Arc<dyn cascade::RelayHandle>>) -> Result<Arc<Self>> {
        let datagram = Arc::new(DatagramEndpoint::bind(config.bind_addr)?);
        let noise = Arc::new(NoiseSessionManager::new(local_private_key, config.noise.clone()));
        let negotiator = Arc::new(Negotiator::new());
        let cascade = Arc::new(cascade::Cascade::new(config.cascade.clone(), relay));
        let monitor = Arc::new(monitor::NetworkMonitor::new(config.monitor.clone()));

        let this = Arc::new(Self {
            datagram: Arc::clone(&datagram),
            noise: Arc::clone(&noise),
            negotiator: Arc::clone(&negotiator),
            cascade,
            monitor,
            app_dispatch: RwLock::new(DispatchTable::new()),
            config,
        });

        this.install_handlers();
        datagram.start_receive_loop()?;
        noise.start_reaper();
        Ok(this)
    }

    fn install_handlers(self: &Arc<Self>) {
        let negotiation_handler = Arc::clone(self);
        self.datagram.register_handler(
            negotiation::PACKET_TYPE_VERSION_NEGOTIATION,
            Arc::new(move |inbound: Inbound| negotiation_handler.on_negotiation(inbound)),
        );

        let handshake_handler = Arc::clone(self);
        self.datagram.register_handler(
            PACKET_TYPE_NOISE_HANDSHAKE,
            Arc::new(move |inbound: Inbound| handshake_handler.on_handshake(inbound)),
        );

        let message_handler = Arc::clone(self);
        self.datagram.register_handler(
            PACKET_TYPE_NOISE_MESSAGE,
            Arc::new(move |inbound: Inbound| message_handler.on_noise_message(inbound)),
        );
    }

    fn on_negotiation(&self, inbound: Inbound) {
        let peer = PeerAddress::from(inbound.from);
        self.monitor.record_received(peer, 1 + inbound.packet.payload().len());

        if Capabilities::decode(inbound.packet.payload()).is_err() {
            self.monitor.record_error(peer);
            return;
        }
        self.negotiator.complete(inbound.from, inbound.packet.into_payload());

        // Reply with our own capabilities so a peer that reached us first
        // doesn't need a second round trip to learn what we support.
        let reply = Packet::new(negotiation::PACKET_TYPE_VERSION_NEGOTIATION, self.config.local_capabilities.encode());
        if let Ok(bytes) = reply.serialize() {
            let _ = self.datagram.send(inbound.from, &bytes);
        }
    }

    fn on_handshake(&self, inbound: Inbound) {
        let peer = PeerAddress::from(inbound.from);
        self.monitor.record_received(peer, 1 + inbound.packet.payload().len());

        match self.noise.process_handshake(inbound.from, inbound.packet.payload()) {
            Ok(Some(reply)) => {
                let packet = Packet::new(PACKET_TYPE_NOISE_HANDSHAKE, reply);
                if let Ok(bytes) = packet.serialize() {
                    if self.datagram.send(inbound.from, &bytes).is_ok() {
                        self.monitor.record_sent(peer, bytes.len());
                    }
                }
            }
            Ok(None) => {}
            Err(_) => self.monitor.record_error(peer),
        }
    }

    fn on_noise_message(&self, inbound: Inbound) {
        let peer = PeerAddress::from(inbound.from);
        self.monitor.record_received(peer, 1 + inbound.packet.payload().len());

        let plaintext = match self.noise.decrypt_from(inbound.from, inbound.packet.payload()) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                self.monitor.record_error(peer);
                return;
            }
        };
        let inner = match Packet::parse(&plaintext) {
            Ok(inner) => inner,
            Err(_) => {
                self.monitor.record_error(peer);
                return;
            }
        };
        self.app_dispatch.read().expect("app dispatch lock poisoned").dispatch(Inbound {
            from: inbound.from,
            packet: inner,
        });
    }

    /// Registers `handler` for `packet_type` on the decrypted application
    /// stream — i.e. for the type byte carried by whatever was wrapped in a
    /// type-251 Noise message, not for 249/250/251 themselves.
    pub fn register_app_handler(&self, packet_type: u8, handler: Arc<dyn PacketHandler>) {
        self.app_dispatch.write().expect("app dispatch lock poisoned").register(packet_type, handler);
    }

    /// Removes the application handler registered for `packet_type`, if any.
    pub fn unregister_app_handler(&self, packet_type: u8) {
        self.app_dispatch.write().expect("app dispatch lock poisoned").unregister(packet_type);
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.datagram.local_addr()?)
    }

    /// Records `addr`'s static Noise public key so a later [`Endpoint::initiate_handshake`]
    /// can build an IK handshake toward it.
    pub fn register_peer_key(&self, addr: SocketAddr, public_key: [u8; 32]) {
        self.noise.register_peer_key(addr, public_key);
    }

    /// Starts a Noise-IK handshake toward `addr` as the initiator, sending
    /// the first handshake message immediately.
    pub fn initiate_handshake(&self, addr: SocketAddr) -> Result<()> {
        let message = self.noise.initiate(addr)?;
        let packet = Packet::new(PACKET_TYPE_NOISE_HANDSHAKE, message);
        let bytes = packet.serialize()?;
        self.datagram.send(addr, &bytes)?;
        self.monitor.record_sent(PeerAddress::from(addr), bytes.len());
        Ok(())
    }

    /// Exchanges capability packets with `addr` and returns the mutually
    /// agreed protocol version, blocking up to `config.negotiation_timeout`
    /// for the peer's reply.
    pub fn negotiate(&self, addr: SocketAddr) -> Result<ProtocolVersion> {
        let pending = self.negotiator.begin(addr);
        let request = Packet::new(negotiation::PACKET_TYPE_VERSION_NEGOTIATION, self.config.local_capabilities.encode());
        let bytes = request.serialize()?;
        self.datagram.send(addr, &bytes)?;
        self.monitor.record_sent(PeerAddress::from(addr), bytes.len());

        let peer_caps = pending.wait(self.config.negotiation_timeout)?;
        Ok(negotiation::select_best_version(&self.config.local_capabilities, &peer_caps)?)
    }

    /// Runs the NAT traversal cascade against `remote_addr`, trying each
    /// enabled method in priority order.
    pub fn establish(&self, remote_addr: SocketAddr) -> cascade::Result<cascade::ConnectionAttempt> {
        let local_addr = self.local_addr().unwrap_or(self.config.bind_addr);
        let context = cascade::EstablishContext {
            local_addr,
            cancellation: wire::CancellationToken::new(),
        };
        self.cascade.establish(&context, remote_addr)
    }

    /// Sends `packet` to `addr`, encrypting it through `addr`'s Noise
    /// session when one is ready, bypassing encryption for the reserved
    /// negotiation/handshake types, and otherwise honoring
    /// [`noise::Config::allow_unencrypted_fallback`]. If `addr` has no
    /// session at all yet, this is treated as the first outbound message to
    /// that peer and a handshake is initiated as a side effect (the peer's
    /// key must already be registered via [`Endpoint::register_peer_key`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeNotReady`] if no session is ready and
    /// unencrypted fallback is disabled.
    pub fn send(&self, addr: SocketAddr, packet: &Packet) -> Result<()> {
        let peer = PeerAddress::from(addr);
        let packet_type = packet.packet_type();

        if packet_type == negotiation::PACKET_TYPE_VERSION_NEGOTIATION || packet_type == PACKET_TYPE_NOISE_HANDSHAKE {
            let bytes = packet.serialize()?;
            self.datagram.send(addr, &bytes)?;
            self.monitor.record_sent(peer, bytes.len());
            return Ok(());
        }

        if self.noise.is_ready(addr) {
            let plaintext = packet.serialize()?;
            let ciphertext = self.noise.encrypt_for(addr, &plaintext)?;
            let envelope = Packet::new(PACKET_TYPE_NOISE_MESSAGE, ciphertext);
            let bytes = envelope.serialize()?;
            self.datagram.send(addr, &bytes)?;
            self.monitor.record_sent(peer, bytes.len());
            return Ok(());
        }

        // No complete session yet: this is the first outbound message to
        // `addr`, so kick off a handshake as the initiator (spec.md §3,
        // NoiseSession lifecycle: "created on first outbound message to a
        // known peer"). If a handshake is already in flight this is a
        // no-op; if `addr`'s key was never registered there is nothing to
        // initiate and the packet falls through to the fallback/error
        // decision below.
        if !self.noise.has_session(addr) {
            if let Ok(message) = self.noise.initiate(addr) {
                let handshake = Packet::new(PACKET_TYPE_NOISE_HANDSHAKE, message);
                if let Ok(bytes) = handshake.serialize() {
                    if self.datagram.send(addr, &bytes).is_ok() {
                        self.monitor.record_sent(peer, bytes.len());
                    }
                }
            }
        }

        if self.noise.may_send_unencrypted(addr) {
            let bytes = packet.serialize()?;
            self.datagram.send(addr, &bytes)?;
            self.monitor.record_sent(peer, bytes.len());
            return Ok(());
        }

        Err(Error::HandshakeNotReady(addr))
    }

    /// Drops `addr`'s Noise session, if any.
    pub fn close_session(&self, addr: SocketAddr) {
        self.noise.close(addr);
    }

    /// A snapshot of global traffic counters and derived metrics.
    #[must_use]
    pub fn global_stats(&self) -> monitor::GlobalStats {
        self.monitor.global_stats()
    }

    /// Evaluates every configured alert threshold against current
    /// measurements.
    #[must_use]
    pub fn check_alerts(&self) -> Vec<monitor::Alert> {
        self.monitor.check_alerts()
    }

    /// Closes the underlying socket. Any handle still held elsewhere
    /// observes [`transport::Error::EndpointClosed`] on its next send.
    pub fn close(&self) {
        self.datagram.close();
    }
}

/// Noise-IK handshake, tag 250. Bypasses encryption.
const PACKET_TYPE_NOISE_HANDSHAKE: u8 = 250;
/// Noise message, tag 251. Opaque ciphertext wrapping an inner packet.
const PACKET_TYPE_NOISE_MESSAGE: u8 = 251;
