//! Wire encoding for peer addresses used in inter-node signalling.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::{Error, Result};

/// A (network-family, byte-addr, port) tuple, encoded on the wire as 6 bytes
/// for IPv4 (4 address bytes + 2 big-endian port bytes) or 18 bytes for IPv6
/// (16 address bytes + 2 big-endian port bytes).
///
/// Equality and hashing are defined over the canonical wire bytes; the
/// `Display` string is a convenience for logging and map keys only, not a
/// substitute for [`PeerAddress::to_bytes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeerAddress {
    /// An IPv4 endpoint.
    V4(Ipv4Addr, u16),
    /// An IPv6 endpoint.
    V6(Ipv6Addr, u16),
}

impl PeerAddress {
    /// Encodes this address into its canonical wire form.
    #[must_use]
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            PeerAddress::V4(addr, port) => {
                let mut out = Vec::with_capacity(6);
                out.extend_from_slice(&addr.octets());
                out.extend_from_slice(&port.to_be_bytes());
                out
            }
            PeerAddress::V6(addr, port) => {
                let mut out = Vec::with_capacity(18);
                out.extend_from_slice(&addr.octets());
                out.extend_from_slice(&port.to_be_bytes());
                out
            }
        }
    }

    /// Decodes a 6-byte (IPv4) or 18-byte (IPv6) wire encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            6 => {
                let addr = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
                let port = u16::from_be_bytes([bytes[4], bytes[5]]);
                Ok(PeerAddress::V4(addr, port))
            }
            18 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&bytes[0..16]);
                let addr = Ipv6Addr::from(octets);
                let port = u16::from_be_bytes([bytes[16], bytes[17]]);
                Ok(PeerAddress::V6(addr, port))
            }
            actual => Err(Error::InvalidAddressEncoding { actual }),
        }
    }

    /// Returns the port component.
    #[must_use]
    pub const fn port(self) -> u16 {
        match self {
            PeerAddress::V4(_, port) | PeerAddress::V6(_, port) => port,
        }
    }

    /// Returns the IP address component.
    #[must_use]
    pub fn ip(self) -> IpAddr {
        match self {
            PeerAddress::V4(addr, _) => IpAddr::V4(addr),
            PeerAddress::V6(addr, _) => IpAddr::V6(addr),
        }
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => PeerAddress::V4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => PeerAddress::V6(*v6.ip(), v6.port()),
        }
    }
}

impl From<PeerAddress> for SocketAddr {
    fn from(addr: PeerAddress) -> Self {
        match addr {
            PeerAddress::V4(ip, port) => SocketAddr::new(IpAddr::V4(ip), port),
            PeerAddress::V6(ip, port) => SocketAddr::new(IpAddr::V6(ip), port),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let socket: SocketAddr = (*self).into();
        write!(f, "{socket}")
    }
}
