//! SSDP `M-SEARCH` discovery of UPnP Internet Gateway Devices.

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use crate::{Error, Result};

const MULTICAST_ADDR: &str = "239.255.255.250:1900";
const SEARCH_TARGET: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

fn m_search_request() -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {SEARCH_TARGET}\r\n\
         \r\n"
    )
}

/// Broadcasts an SSDP `M-SEARCH` and returns the `LOCATION` header of the
/// first gateway that answers within `timeout`.
pub fn discover(timeout: Duration) -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(Duration::from_millis(500)))?;
    socket.send_to(m_search_request().as_bytes(), MULTICAST_ADDR)?;

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 2048];
    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((len, _)) => {
                let response = String::from_utf8_lossy(&buf[..len]);
                if let Some(location) = extract_header(&response, "LOCATION") {
                    return Ok(location);
                }
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => return Err(Error::Io(err)),
        }
    }
    Err(Error::NoGatewayFound)
}

fn extract_header(response: &str, name: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}
