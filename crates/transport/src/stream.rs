//! Connection-oriented transport: length-framed messages over accepted or
//! dialed TCP streams.

use std::collections::HashMap;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use meshwire_wire::{framing, Packet};

use crate::dispatch::DispatchTable;
use crate::{Error, Inbound, Result};

/// Deadline applied to each outbound frame write.
const WRITE_DEADLINE: Duration = Duration::from_secs(5);

/// A listening socket plus a cache of outbound connections, each running a
/// dedicated reader thread that frames inbound bytes via
/// [`meshwire_wire::framing`] and dispatches the parsed packet.
pub struct StreamEndpoint {
    listener: TcpListener,
    dispatch: RwLock<DispatchTable>,
    closed: AtomicBool,
    outbound: Mutex<HashMap<SocketAddr, TcpStream>>,
}

impl StreamEndpoint {
    /// Binds a listener at `local_addr`.
    pub fn bind(local_addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(local_addr)?;
        Ok(Self {
            listener,
            dispatch: RwLock::new(DispatchTable::new()),
            closed: AtomicBool::new(false),
            outbound: Mutex::new(HashMap::new()),
        })
    }

    /// The listener's local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Registers a handler for `packet_type`, replacing any previous
    /// registration.
    pub fn register_handler(&self, packet_type: u8, handler: Arc<dyn crate::PacketHandler>) {
        self.dispatch.write().expect("dispatch lock poisoned").register(packet_type, handler);
    }

    /// Marks the endpoint closed. The accept loop observes this on its next
    /// iteration; existing connections are dropped from the outbound cache.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.outbound.lock().expect("outbound lock poisoned").clear();
    }

    /// Whether the endpoint has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Starts the accept loop on a dedicated thread. Each accepted
    /// connection gets its own reader thread.
    pub fn start_accept_loop(self: &Arc<Self>) -> Result<()> {
        self.listener.set_nonblocking(false)?;
        let endpoint = Arc::clone(self);
        thread::spawn(move || endpoint.accept_loop());
        Ok(())
    }

    fn accept_loop(self: Arc<Self>) {
        for stream in self.listener.incoming() {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            let Ok(stream) = stream else {
                continue;
            };
            let Ok(peer) = stream.peer_addr() else {
                continue;
            };
            if let Ok(clone) = stream.try_clone() {
                self.outbound
                    .lock()
                    .expect("outbound lock poisoned")
                    .insert(peer, clone);
            }
            let endpoint = Arc::clone(&self);
            thread::spawn(move || endpoint.reader_loop(peer, stream));
        }
    }

    fn reader_loop(self: Arc<Self>, peer: SocketAddr, stream: TcpStream) {
        let mut reader = BufReader::new(stream);
        loop {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            let Ok(body) = framing::read_frame(&mut reader) else {
                break;
            };
            let Ok(packet) = Packet::parse(&body) else {
                continue;
            };
            let dispatch = self.dispatch.read().expect("dispatch lock poisoned");
            dispatch.dispatch(Inbound { from: peer, packet });
        }
        self.outbound.lock().expect("outbound lock poisoned").remove(&peer);
    }

    /// Dials `to` if no cached outbound connection exists, then writes a
    /// single length-framed packet with a 5-second write deadline. A cached
    /// connection that fails to write is evicted so the next call dials
    /// fresh.
    pub fn send_packet(self: &Arc<Self>, to: SocketAddr, packet: &Packet) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::EndpointClosed);
        }
        let body = packet.serialize()?;

        let mut stream = self.take_or_dial(to)?;
        stream.set_write_timeout(Some(WRITE_DEADLINE))?;
        match framing::write_frame(&mut stream, &body) {
            Ok(()) => {
                self.cache_outbound(to, stream);
                Ok(())
            }
            Err(err) => {
                self.outbound.lock().expect("outbound lock poisoned").remove(&to);
                Err(Error::from(err))
            }
        }
    }

    fn take_or_dial(&self, to: SocketAddr) -> Result<TcpStream> {
        if let Some(stream) = self.outbound.lock().expect("outbound lock poisoned").remove(&to) {
            return Ok(stream);
        }
        Ok(TcpStream::connect(to)?)
    }

    fn cache_outbound(&self, to: SocketAddr, stream: TcpStream) {
        self.outbound.lock().expect("outbound lock poisoned").insert(to, stream);
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
    fn round_trips_a_packet_over_an_accepted_connection() {
        let server = Arc::new(StreamEndpoint::bind(loopback()).unwrap());
        let server_addr = server.local_addr().unwrap();

        let (tx, rx) = mpsc::channel();
        server.register_handler(
            7,
            Arc::new(move |inbound: Inbound| {
                let _ = tx.send(inbound);
            }),
        );
        server.start_accept_loop().unwrap();

        let client = Arc::new(StreamEndpoint::bind(loopback()).unwrap());
        let packet = Packet::new(7, vec![1, 2, 3]);
        client.send_packet(server_addr, &packet).unwrap();

        let inbound = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(inbound.packet, packet);

        server.close();
        client.close();
    }

    #[test]
    fn send_after_close_fails() {
        let endpoint = Arc::new(StreamEndpoint::bind(loopback()).unwrap());
        endpoint.close();
        let err = endpoint
            .send_packet(loopback(), &Packet::new(1, vec![1]))
            .unwrap_err();
        assert!(matches!(err, Error::EndpointClosed));
    }

    #[test]
    fn reused_cached_connection_survives_a_second_send() {
        let server = Arc::new(StreamEndpoint::bind(loopback()).unwrap());
        let server_addr = server.local_addr().unwrap();

        let (tx, rx) = mpsc::channel();
        server.register_handler(
            7,
            Arc::new(move |inbound: Inbound| {
                let _ = tx.send(inbound);
            }),
        );
        server.start_accept_loop().unwrap();

        let client = Arc::new(StreamEndpoint::bind(loopback()).unwrap());
        client
            .send_packet(server_addr, &Packet::new(7, vec![1]))
            .unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();

        client
            .send_packet(server_addr, &Packet::new(7, vec![2]))
            .unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();

        server.close();
        client.close();
    }
}
