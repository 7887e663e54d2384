//! Routes inbound datagrams, by source address, to per-peer logical
//! connections layered over a single shared [`DatagramEndpoint`].
//!
//! # Overview
//!
//! A [`Multiplexer`] owns no socket of its own — it installs itself across
//! every packet-type slot of a shared [`meshwire_transport::DatagramEndpoint`]
//! and, for each inbound datagram, resolves (or creates) the
//! [`Connection`] keyed by source address before handing the packet to a
//! type-specific or default [`PacketHandler`] via its internal
//! [`router::Router`]. Connection ids never alias: they mix the source
//! address with a monotonic counter (see [`id::ConnectionId`]), so a reaped
//! connection's id is never handed back out to a later arrival from the
//! same address.
//!
//! # Reaping
//!
//! A background maintenance thread periodically walks the connection map
//! and removes entries that are both in a terminal state
//! ([`ConnectionState::Disconnected`] or [`ConnectionState::Error`]) and
//! have been idle for at least the configured timeout (5 minutes by
//! default, per the spec).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod connection;
mod id;
mod router;
mod state;
mod stats;

pub use connection::Connection;
pub use id::ConnectionId;
pub use state::ConnectionState;
pub use stats::{AggregateStats, ConnectionStats};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use meshwire_transport::{DatagramEndpoint, Inbound, PacketHandler};
use meshwire_wire::Packet;
use rustc_hash::FxHashMap;
use thiserror::Error;

use id::IdGenerator;
use router::Router;

/// Errors raised by the connection multiplexer.
#[derive(Debug, Error)]
pub enum Error {
    /// No connection is tracked under the given id.
    #[error("no connection with id {0:?}")]
    UnknownConnection(ConnectionId),
    /// The underlying endpoint rejected the operation.
    #[error(transparent)]
    Transport(#[from] meshwire_transport::Error),
    /// The outgoing packet could not be framed.
    #[error(transparent)]
    Wire(#[from] meshwire_wire::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Tunable knobs for a [`Multiplexer`].
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// How long a connection in a terminal state must be idle before the
    /// maintenance loop collects it. Spec default: 5 minutes.
    pub idle_timeout: Duration,
    /// How often the maintenance loop walks the connection map looking for
    /// reapable entries.
    pub reap_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(5 * 60),
            reap_interval: Duration::from_secs(30),
        }
    }
}

/// Routes inbound datagrams by source address to per-peer
/// [`Connection`]s over one shared [`DatagramEndpoint`].
pub struct Multiplexer {
    endpoint: Arc<DatagramEndpoint>,
    config: Config,
    by_id: RwLock<FxHashMap<ConnectionId, Arc<Connection>>>,
    by_addr: RwLock<FxHashMap<SocketAddr, ConnectionId>>,
    ids: IdGenerator,
    router: Arc<Router>,
    reaping: AtomicBool,
}

impl Multiplexer {
    /// Installs a multiplexer over `endpoint`, taking over every packet
    /// type slot in its dispatch table. Call [`Self::register_handler`]
    /// and [`Self::set_default_handler`] to wire up application-level
    /// routing before traffic arrives.
    #[must_use]
    pub fn new(endpoint: Arc<DatagramEndpoint>, config: Config) -> Arc<Self> {
        let mux = Arc::new(Self {
            endpoint: Arc::clone(&endpoint),
            config,
            by_id: RwLock::new(FxHashMap::default()),
            by_addr: RwLock::new(FxHashMap::default()),
            ids: IdGenerator::new(),
            router: Arc::new(Router::new()),
            reaping: AtomicBool::new(false),
        });

        let installed = Arc::clone(&mux);
        for packet_type in 0..=255u8 {
            let handler: Arc<dyn PacketHandler> = {
                let mux = Arc::clone(&installed);
                Arc::new(move |inbound: Inbound| mux.on_inbound(inbound))
            };
            endpoint.register_handler(packet_type, handler);
        }
        mux
    }

    /// Registers `handler` for `packet_type`, invoked once a connection has
    /// been resolved for the inbound packet's source address. Replaces any
    /// previous registration for that type.
    pub fn register_handler(&self, packet_type: u8, handler: Arc<dyn PacketHandler>) {
        self.router.register(packet_type, handler);
    }

    /// Removes the handler registered for `packet_type`, if any.
    pub fn unregister_handler(&self, packet_type: u8) {
        self.router.unregister(packet_type);
    }

    /// Sets the handler invoked for packets whose type has no specific
    /// registration. Unmatched packets without a default handler bump the
    /// routing-error counter instead.
    pub fn set_default_handler(&self, handler: Arc<dyn PacketHandler>) {
        self.router.set_default(handler);
    }

    /// Creates a fresh logical connection to `remote`, returning its id.
    /// If a connection already exists for `remote`, it is replaced (the
    /// old id stops routing to it; future inbound from `remote` lands on
    /// the new one).
    pub fn create_connection(&self, remote: SocketAddr) -> ConnectionId {
        let id = self.ids.next(remote);
        let conn = Arc::new(Connection::new(id, remote));
        self.by_id.write().expect("multiplex id map poisoned").insert(id, Arc::clone(&conn));
        self.by_addr.write().expect("multiplex addr map poisoned").insert(remote, id);
        id
    }

    /// Looks up a tracked connection by id.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.by_id.read().expect("multiplex id map poisoned").get(&id).cloned()
    }

    /// Marks a connection disconnected and drops it from the address
    /// index immediately; it remains reachable by id (in the
    /// [`ConnectionState::Disconnected`] state) until the maintenance loop
    /// collects it once also idle past the configured timeout.
    pub fn close(&self, id: ConnectionId) -> Result<()> {
        let conn = self.get(id).ok_or(Error::UnknownConnection(id))?;
        conn.set_state(ConnectionState::Disconnected);
        self.by_addr
            .write()
            .expect("multiplex addr map poisoned")
            .retain(|_, mapped| *mapped != id);
        Ok(())
    }

    /// Serializes and sends `packet` over the connection tracked as `id`.
    pub fn send_packet(&self, id: ConnectionId, packet: &Packet) -> Result<()> {
        let conn = self.get(id).ok_or(Error::UnknownConnection(id))?;
        let bytes = packet.serialize()?;
        let result = self.endpoint.send(conn.remote_addr(), &bytes);
        match result {
            Ok(()) => {
                conn.record_sent(bytes.len());
                Ok(())
            }
            Err(err) => {
                conn.record_error();
                Err(err.into())
            }
        }
    }

    /// Every currently tracked connection id.
    #[must_use]
    pub fn list(&self) -> Vec<ConnectionId> {
        self.by_id.read().expect("multiplex id map poisoned").keys().copied().collect()
    }

    /// A consistent snapshot of every connection's counters plus
    /// workspace-wide totals, taken under one read lock.
    #[must_use]
    pub fn stats(&self) -> AggregateStats {
        let connections: Vec<ConnectionStats> = self
            .by_id
            .read()
            .expect("multiplex id map poisoned")
            .values()
            .map(|conn| conn.snapshot())
            .collect();
        AggregateStats::from_connections(connections, self.router.routing_errors())
    }

    /// Starts the background maintenance thread that reaps stale
    /// connections. Idempotent — a second call is a no-op if a reaper is
    /// already running.
    pub fn start_maintenance(self: &Arc<Self>) {
        if self
            .reaping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let mux = Arc::clone(self);
        thread::spawn(move || loop {
            thread::sleep(mux.config.reap_interval);
            mux.reap_once();
        });
    }

    /// Removes every connection that is both in a terminal state and idle
    /// past the configured timeout. Exposed directly so tests can trigger
    /// a pass without waiting on the background interval.
    pub fn reap_once(&self) {
        let reapable: Vec<ConnectionId> = self
            .by_id
            .read()
            .expect("multiplex id map poisoned")
            .iter()
            .filter(|(_, conn)| conn.is_reapable(self.config.idle_timeout))
            .map(|(id, _)| *id)
            .collect();

        if reapable.is_empty() {
            return;
        }
        let mut by_id = self.by_id.write().expect("multiplex id map poisoned");
        let mut by_addr = self.by_addr.write().expect("multiplex addr map poisoned");
        for id in reapable {
            by_id.remove(&id);
            by_addr.retain(|_, mapped| *mapped != id);
        }
    }

    fn on_inbound(&self, inbound: Inbound) {
        let id = {
            let existing = self.by_addr.read().expect("multiplex addr map poisoned").get(&inbound.from).copied();
            match existing {
                Some(id) => id,
                None => self.create_connection(inbound.from),
            }
        };
        if let Some(conn) = self.get(id) {
            conn.record_received(1 + inbound.packet.payload().len());
        }
        self.router.route(inbound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration as StdDuration;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn create_connection_is_retrievable_by_id() {
        let endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        let mux = Multiplexer::new(endpoint, Config::default());
        let remote: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let id = mux.create_connection(remote);
        let conn = mux.get(id).unwrap();
        assert_eq!(conn.remote_addr(), remote);
        assert_eq!(conn.state(), ConnectionState::Idle);
    }

    #[test]
    fn close_moves_connection_to_disconnected_and_drops_address_index() {
        let endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        let mux = Multiplexer::new(endpoint, Config::default());
        let remote: SocketAddr = "127.0.0.1:9002".parse().unwrap();
        let id = mux.create_connection(remote);
        mux.close(id).unwrap();
        assert_eq!(mux.get(id).unwrap().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn reap_once_collects_only_terminal_and_idle_connections() {
        let endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        let config = Config {
            idle_timeout: Duration::from_millis(1),
            reap_interval: Duration::from_secs(3600),
        };
        let mux = Multiplexer::new(endpoint, config);

        let active = mux.create_connection("127.0.0.1:9101".parse().unwrap());
        let stale = mux.create_connection("127.0.0.1:9102".parse().unwrap());
        mux.close(stale);
        thread::sleep(StdDuration::from_millis(5));

        mux.reap_once();

        assert!(mux.get(active).is_some());
        assert!(mux.get(stale).is_none());
    }

    #[test]
    fn unknown_connection_id_fails_send_and_close() {
        let endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        let mux = Multiplexer::new(endpoint, Config::default());
        let never_created = IdGenerator::new().next("127.0.0.1:1".parse().unwrap());

        assert!(matches!(
            mux.close(never_created),
            Err(Error::UnknownConnection(_))
        ));
        let packet = Packet::new(20, vec![]);
        assert!(matches!(
            mux.send_packet(never_created, &packet),
            Err(Error::UnknownConnection(_))
        ));
    }

    #[test]
    fn inbound_packet_from_new_address_auto_creates_a_connection() {
        let receiver = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        let receiver_addr = receiver.local_addr().unwrap();
        let mux = Multiplexer::new(Arc::clone(&receiver), Config::default());

        let (tx, rx) = mpsc::channel();
        mux.set_default_handler(Arc::new(move |inbound: Inbound| {
            let _ = tx.send(inbound);
        }));
        receiver.start_receive_loop().unwrap();

        let sender = DatagramEndpoint::bind(loopback()).unwrap();
        let packet = Packet::new(20, vec![1, 2, 3]);
        sender.send(receiver_addr, &packet.serialize().unwrap()).unwrap();

        let inbound = rx.recv_timeout(StdDuration::from_secs(2)).unwrap();
        assert_eq!(inbound.packet, packet);
        assert_eq!(mux.list().len(), 1);

        receiver.close();
    }
}
