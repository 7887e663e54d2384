//! SOAP request/response plumbing for `WANIPConnection:1` actions.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::{Error, Result};

const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

fn parse_url(url: &str) -> Result<ParsedUrl> {
    let rest = url.strip_prefix("http://").ok_or(Error::MalformedResponse)?;
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let (host, port) = authority
        .split_once(':')
        .map(|(h, p)| (h, p.parse().unwrap_or(80)))
        .unwrap_or((authority, 80));
    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path: format!("/{path}"),
    })
}

fn build_envelope(action: &str, args: &[(&str, String)]) -> String {
    let mut params = String::new();
    for (name, value) in args {
        params.push_str(&format!("<{name}>{value}</{name}>"));
    }
    format!(
        r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body>
<u:{action} xmlns:u="{SERVICE_TYPE}">
{params}
</u:{action}>
</s:Body>
</s:Envelope>"#
    )
}

/// Issues one SOAP action against `control_url` and returns the response
/// body's named out-parameters, keyed by tag name.
pub fn invoke(
    control_url: &str,
    action: &str,
    args: &[(&str, String)],
    timeout: Duration,
) -> Result<HashMap<String, String>> {
    let parsed = parse_url(control_url)?;
    let body = build_envelope(action, args);

    let mut stream = TcpStream::connect((parsed.host.as_str(), parsed.port))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let request = format!(
        "POST {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Content-Type: text/xml; charset=\"utf-8\"\r\n\
         SOAPAction: \"{SERVICE_TYPE}#{action}\"\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n\
         {body}",
        parsed.path,
        parsed.host,
        body.len(),
    );
    stream.write_all(request.as_bytes())?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let response_body = response.split_once("\r\n\r\n").map_or(response.as_str(), |(_, b)| b);

    if response_body.contains("<s:Fault>") || response_body.contains("<Fault>") {
        let detail = extract_tag(response_body, "errorDescription")
            .or_else(|| extract_tag(response_body, "faultstring"))
            .unwrap_or_else(|| "unknown SOAP fault".to_string());
        return Err(Error::SoapFault { detail });
    }

    Ok(extract_all_tags(response_body))
}

fn extract_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim().to_string())
}

fn extract_all_tags(body: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut rest = body;
    while let Some(lt) = rest.find('<') {
        let after_lt = &rest[lt + 1..];
        let Some(gt) = after_lt.find('>') else { break };
        let tag = &after_lt[..gt];
        if tag.starts_with('/') || tag.is_empty() {
            rest = &after_lt[gt + 1..];
            continue;
        }
        let tag_name = tag.split_whitespace().next().unwrap_or(tag);
        if let Some(value) = extract_tag(&rest[lt..], tag_name) {
            if !value.contains('<') {
                out.insert(tag_name.to_string(), value);
            }
        }
        rest = &after_lt[gt + 1..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_names_the_action_and_service_type() {
        let envelope = build_envelope("GetExternalIPAddress", &[]);
        assert!(envelope.contains("u:GetExternalIPAddress"));
        assert!(envelope.contains(SERVICE_TYPE));
    }

    #[test]
    fn extracts_simple_leaf_tags() {
        let body = "<NewExternalIPAddress>203.0.113.9</NewExternalIPAddress>";
        let tags = extract_all_tags(body);
        assert_eq!(tags.get("NewExternalIPAddress").unwrap(), "203.0.113.9");
    }

    #[test]
    fn parses_url_with_implicit_port() {
        let err = parse_url("not-a-url").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse));
    }
}
