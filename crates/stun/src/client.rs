//! Reflexive address discovery against a list of public STUN servers.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::message::{encode_binding_request, new_transaction_id, parse_binding_response};
use crate::{Error, Result};

/// Public servers tried, in order, when a caller does not supply its own
/// list.
pub const DEFAULT_SERVERS: [&str; 4] = [
    "stun.l.google.com:19302",
    "stun1.l.google.com:19302",
    "stun2.l.google.com:19302",
    "stun.cloudflare.com:3478",
];

/// How long a single server is given to answer before moving on.
const DEFAULT_PER_SERVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for [`discover_reflexive`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Servers tried in order until one responds.
    pub servers: Vec<String>,
    /// Timeout applied to each individual server.
    pub per_server_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers: DEFAULT_SERVERS.iter().map(|s| s.to_string()).collect(),
            per_server_timeout: DEFAULT_PER_SERVER_TIMEOUT,
        }
    }
}

/// Discovers the caller's server-reflexive address by binding
/// `local_addr` and sending a binding request to each configured server in
/// turn, returning the first usable answer.
///
/// # Errors
///
/// Returns [`Error::NoServerResponded`] only once every server in
/// `config.servers` has failed (timed out, refused, or answered with a
/// malformed/mismatched message).
pub fn discover_reflexive(local_addr: SocketAddr, config: &Config) -> Result<SocketAddr> {
    let socket = UdpSocket::bind(local_addr)?;
    socket.set_read_timeout(Some(config.per_server_timeout))?;

    for server in &config.servers {
        if let Ok(addr) = try_server(&socket, server) {
            return Ok(addr);
        }
    }
    Err(Error::NoServerResponded)
}

fn try_server(socket: &UdpSocket, server: &str) -> Result<SocketAddr> {
    let txn = new_transaction_id();
    let request = encode_binding_request(txn);
    socket.send_to(&request, server)?;

    let mut buf = [0u8; 512];
    let (len, _from) = socket.recv_from(&mut buf)?;
    parse_binding_response(&buf[..len], txn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MAGIC_COOKIE;
    use std::net::Ipv4Addr;
    use std::thread;

    #[test]
    fn discovers_reflexive_address_against_a_loopback_fake_server() {
        let fake_server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = fake_server.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (len, client_addr) = fake_server.recv_from(&mut buf).unwrap();
            assert!(len >= 20);
            let txn: [u8; 12] = buf[8..20].try_into().unwrap();

            let cookie_bytes = MAGIC_COOKIE.to_be_bytes();
            let xor_port =
                client_addr.port() ^ u16::from_be_bytes([cookie_bytes[0], cookie_bytes[1]]);
            let mut attr_value = vec![0u8, 0x01];
            attr_value.extend_from_slice(&xor_port.to_be_bytes());
            if let std::net::SocketAddr::V4(v4) = client_addr {
                let octets = v4.ip().octets();
                for i in 0..4 {
                    attr_value.push(octets[i] ^ cookie_bytes[i]);
                }
            }

            let mut response = Vec::new();
            response.extend_from_slice(&0x0101u16.to_be_bytes());
            response.extend_from_slice(&((4 + attr_value.len()) as u16).to_be_bytes());
            response.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
            response.extend_from_slice(&txn);
            response.extend_from_slice(&0x0020u16.to_be_bytes());
            response.extend_from_slice(&(attr_value.len() as u16).to_be_bytes());
            response.extend_from_slice(&attr_value);
            fake_server.send_to(&response, client_addr).unwrap();
        });

        let config = Config {
            servers: vec![server_addr.to_string()],
            per_server_timeout: Duration::from_secs(2),
        };
        let reflexive =
            discover_reflexive("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        assert_eq!(reflexive.ip(), Ipv4Addr::new(127, 0, 0, 1));

        handle.join().unwrap();
    }

    #[test]
    fn every_server_failing_yields_no_server_responded() {
        let config = Config {
            servers: vec!["127.0.0.1:1".to_string()],
            per_server_timeout: Duration::from_millis(100),
        };
        let err = discover_reflexive("127.0.0.1:0".parse().unwrap(), &config).unwrap_err();
        assert!(matches!(err, Error::NoServerResponded));
    }

    #[test]
    fn default_config_lists_four_public_servers() {
        assert_eq!(Config::default().servers.len(), 4);
    }
}
