//! Connectionless transport: one bound UDP socket serving many peers.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::dispatch::DispatchTable;
use crate::{Error, Inbound, Result};
use meshwire_wire::Packet;

/// Datagrams larger than this are dropped and counted rather than dispatched.
pub const MAX_DATAGRAM_LEN: usize = 65_535;

/// How long the receive loop blocks on a single `recv_from` before checking
/// whether it has been asked to stop. Short enough that `close` is
/// observed promptly, long enough to avoid spinning.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A bound UDP socket with a registered [`DispatchTable`] and a background
/// receive loop.
///
/// At most one receive loop may run per endpoint; starting a second one
/// fails with [`Error::ReceiveLoopAlreadyRunning`]. Cloning an
/// [`Arc<DatagramEndpoint>`] and handing it to a session manager or
/// multiplexer is the intended sharing pattern — `close` is visible to every
/// holder of that `Arc`.
pub struct DatagramEndpoint {
    socket: UdpSocket,
    dispatch: RwLock<DispatchTable>,
    closed: AtomicBool,
    receiving: AtomicBool,
    oversized_dropped: AtomicU64,
}

impl DatagramEndpoint {
    /// Binds a new UDP socket at `local_addr`.
    pub fn bind(local_addr: SocketAddr) -> Result<Self> {
        let domain = if local_addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&local_addr.into())?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let socket: UdpSocket = socket.into();

        Ok(Self {
            socket,
            dispatch: RwLock::new(DispatchTable::new()),
            closed: AtomicBool::new(false),
            receiving: AtomicBool::new(false),
            oversized_dropped: AtomicU64::new(0),
        })
    }

    /// The socket's local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Registers a handler for `packet_type`, replacing any previous
    /// registration.
    pub fn register_handler(&self, packet_type: u8, handler: Arc<dyn crate::PacketHandler>) {
        self.dispatch.write().expect("dispatch lock poisoned").register(packet_type, handler);
    }

    /// Removes the handler registered for `packet_type`, if any.
    pub fn unregister_handler(&self, packet_type: u8) {
        self.dispatch.write().expect("dispatch lock poisoned").unregister(packet_type);
    }

    /// Sends a raw, already-serialized packet to `to`.
    pub fn send(&self, to: SocketAddr, bytes: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::EndpointClosed);
        }
        self.socket.send_to(bytes, to)?;
        Ok(())
    }

    /// Number of inbound datagrams dropped for exceeding
    /// [`MAX_DATAGRAM_LEN`].
    #[must_use]
    pub fn oversized_dropped(&self) -> u64 {
        self.oversized_dropped.load(Ordering::SeqCst)
    }

    /// Whether the endpoint has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Requests that the receive loop stop and marks the endpoint closed.
    /// Idempotent. Any handle still held elsewhere observes
    /// [`Error::EndpointClosed`] on its next `send`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Starts the background receive loop on a dedicated thread, returning
    /// immediately. Each inbound datagram is parsed and dispatched from a
    /// freshly spawned thread so a slow handler cannot stall subsequent
    /// reads.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ReceiveLoopAlreadyRunning`] if a loop is already
    /// active on this endpoint.
    pub fn start_receive_loop(self: &Arc<Self>) -> Result<()> {
        if self
            .receiving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::ReceiveLoopAlreadyRunning);
        }

        let endpoint = Arc::clone(self);
        thread::spawn(move || endpoint.receive_loop());
        Ok(())
    }

    fn receive_loop(self: Arc<Self>) {
        let mut buf = [0u8; MAX_DATAGRAM_LEN + 1];
        while !self.closed.load(Ordering::SeqCst) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    if len > MAX_DATAGRAM_LEN {
                        self.oversized_dropped.fetch_add(1, Ordering::SeqCst);
                        continue;
                    }
                    let bytes = buf[..len].to_vec();
                    let endpoint = Arc::clone(&self);
                    thread::spawn(move || endpoint.handle_datagram(from, &bytes));
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(_) => continue,
            }
        }
        self.receiving.store(false, Ordering::SeqCst);
    }

    fn handle_datagram(&self, from: SocketAddr, bytes: &[u8]) {
        let Ok(packet) = Packet::parse(bytes) else {
            return;
        };
        let dispatch = self.dispatch.read().expect("dispatch lock poisoned");
        dispatch.dispatch(Inbound { from, packet });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn send_after_close_fails() {
        let endpoint = DatagramEndpoint::bind(loopback()).unwrap();
        endpoint.close();
        let err = endpoint.send(loopback(), &[1]).unwrap_err();
        assert!(matches!(err, Error::EndpointClosed));
    }

    #[test]
    fn second_receive_loop_is_rejected() {
        let endpoint = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        endpoint.start_receive_loop().unwrap();
        let err = endpoint.start_receive_loop().unwrap_err();
        assert!(matches!(err, Error::ReceiveLoopAlreadyRunning));
        endpoint.close();
    }

    #[test]
    fn round_trips_a_datagram_through_the_receive_loop() {
        let receiver = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        let receiver_addr = receiver.local_addr().unwrap();

        let (tx, rx) = mpsc::channel();
        receiver.register_handler(
            5,
            Arc::new(move |inbound: Inbound| {
                let _ = tx.send(inbound);
            }),
        );
        receiver.start_receive_loop().unwrap();

        let sender = DatagramEndpoint::bind(loopback()).unwrap();
        let packet = Packet::new(5, vec![9, 9]);
        sender
            .send(receiver_addr, &packet.serialize().unwrap())
            .unwrap();

        let inbound = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(inbound.packet, packet);

        receiver.close();
    }

    #[test]
    fn oversized_datagrams_are_dropped_and_counted() {
        let receiver = Arc::new(DatagramEndpoint::bind(loopback()).unwrap());
        let receiver_addr = receiver.local_addr().unwrap();
        receiver.start_receive_loop().unwrap();

        let sender = DatagramEndpoint::bind(loopback()).unwrap();
        sender
            .send(receiver_addr, &vec![0u8; MAX_DATAGRAM_LEN + 1])
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while receiver.oversized_dropped() == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(receiver.oversized_dropped(), 1);

        receiver.close();
    }
}
