//! Coordinated UDP hole punching.
//!
//! # Overview
//!
//! [`punch`] sends a burst of small probe datagrams to a remote address
//! while concurrently listening for the peer's own burst arriving on the
//! same local socket. Both sides are expected to call `punch` toward each
//! other at roughly the same time, coordinated out-of-band (typically via a
//! DHT or rendezvous server outside this crate's concern).
//!
//! # Errors
//!
//! [`punch`] fails fast with [`Error::AddressFamilyMismatch`] if the local
//! and remote addresses are not both IPv4 or both IPv6 — NAT hole punching
//! only makes sense within one address family.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors raised while attempting a punch.
#[derive(Debug, Error)]
pub enum Error {
    /// The local and remote addresses are not the same address family.
    #[error("local address family does not match remote address family")]
    AddressFamilyMismatch,
    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a hole-punch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// At least one probe datagram was received from the remote peer.
    Success,
    /// The socket reported an error during the attempt.
    Failed,
    /// No probe arrived before the burst's deadline elapsed.
    Timeout,
}

/// Probe burst cadence.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of probe datagrams sent.
    pub probes: u32,
    /// Interval between probes.
    pub interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probes: 3,
            interval: Duration::from_millis(200),
        }
    }
}

const PROBE_PAYLOAD: &[u8] = b"meshwire-punch";

/// Attempts to establish a direct UDP path to `remote_addr` by sending a
/// probe burst while listening for the peer's own burst on `local_addr`.
pub fn punch(local_addr: SocketAddr, remote_addr: SocketAddr, config: &Config) -> Result<Outcome> {
    if local_addr.is_ipv4() != remote_addr.is_ipv4() {
        return Err(Error::AddressFamilyMismatch);
    }

    let socket = UdpSocket::bind(local_addr)?;
    let listen_budget = config.interval * config.probes + Duration::from_secs(1);
    socket.set_read_timeout(Some(Duration::from_millis(50)))?;

    let deadline = Instant::now() + listen_budget;
    let mut buf = [0u8; 64];

    for _ in 0..config.probes {
        socket.send_to(PROBE_PAYLOAD, remote_addr)?;
        let probe_deadline = Instant::now() + config.interval;
        while Instant::now() < probe_deadline.min(deadline) {
            match socket.recv_from(&mut buf) {
                Ok((_, from)) if from == remote_addr => return Ok(Outcome::Success),
                Ok(_) => continue,
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(_) => return Ok(Outcome::Failed),
            }
        }
    }

    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((_, from)) if from == remote_addr => return Ok(Outcome::Success),
            Ok(_) => continue,
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(_) => return Ok(Outcome::Failed),
        }
    }

    Ok(Outcome::Timeout)
}
