//! Fetches a gateway's device description XML and extracts the
//! `WANIPConnection:1` control URL, without pulling in a general XML parser
//! — the only thing that matters here is the `<serviceType>` /
//! `<controlURL>` pair inside one `<service>` block.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::{Error, Result};

const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

struct ParsedLocation {
    host: String,
    port: u16,
    path: String,
}

fn parse_location(location: &str) -> Result<ParsedLocation> {
    let rest = location
        .strip_prefix("http://")
        .ok_or(Error::MalformedResponse)?;
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let (host, port) = authority
        .split_once(':')
        .map(|(h, p)| (h, p.parse().unwrap_or(80)))
        .unwrap_or((authority, 80));
    Ok(ParsedLocation {
        host: host.to_string(),
        port,
        path: format!("/{path}"),
    })
}

fn http_get(location: &ParsedLocation, timeout: Duration) -> Result<String> {
    let mut stream = TcpStream::connect((location.host.as_str(), location.port))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        location.path, location.host
    );
    stream.write_all(request.as_bytes())?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}

fn split_http_body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or(response, |(_, body)| body)
}

/// Scans `body` for the `<service>` block whose `<serviceType>` matches
/// `WANIPConnection:1` and returns its `<controlURL>` text.
fn extract_control_url(body: &str) -> Option<&str> {
    let services = body.match_indices("<service>");
    for (start, _) in services {
        let end = body[start..].find("</service>")? + start;
        let block = &body[start..end];
        if block.contains(SERVICE_TYPE) {
            let url_start = block.find("<controlURL>")? + "<controlURL>".len();
            let url_end = block[url_start..].find("</controlURL>")? + url_start;
            return Some(block[url_start..url_end].trim());
        }
    }
    None
}

/// Fetches the device description at `location` and returns the absolute
/// control URL for the gateway's `WANIPConnection:1` service.
pub fn fetch_control_url(location: &str, timeout: Duration) -> Result<String> {
    let parsed = parse_location(location)?;
    let response = http_get(&parsed, timeout)?;
    let body = split_http_body(&response);
    let control_path = extract_control_url(body).ok_or(Error::NoControlUrl)?;

    Ok(if control_path.starts_with("http://") {
        control_path.to_string()
    } else {
        format!(
            "http://{}:{}{}{}",
            parsed.host,
            parsed.port,
            if control_path.starts_with('/') { "" } else { "/" },
            control_path
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_control_url_for_matching_service_only() {
        let body = r#"
            <service>
                <serviceType>urn:schemas-upnp-org:service:WANIPConnection:1</serviceType>
                <controlURL>/ctl/IPConn</controlURL>
            </service>
            <service>
                <serviceType>urn:schemas-upnp-org:service:Layer3Forwarding:1</serviceType>
                <controlURL>/ctl/L3F</controlURL>
            </service>
        "#;
        assert_eq!(extract_control_url(body), Some("/ctl/IPConn"));
    }

    #[test]
    fn returns_none_when_service_missing() {
        let body = "<service><serviceType>SomethingElse:1</serviceType></service>";
        assert_eq!(extract_control_url(body), None);
    }

    #[test]
    fn parses_location_with_explicit_port_and_path() {
        let parsed = parse_location("http://192.168.1.1:1900/desc.xml").unwrap();
        assert_eq!(parsed.host, "192.168.1.1");
        assert_eq!(parsed.port, 1900);
        assert_eq!(parsed.path, "/desc.xml");
    }

    #[test]
    fn resolves_relative_control_url_against_location() {
        assert!(matches!(
            parse_location("not-a-url"),
            Err(Error::MalformedResponse)
        ));
    }
}
