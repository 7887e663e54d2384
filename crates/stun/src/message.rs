//! STUN message encoding/decoding: just enough of RFC 5389 to send a
//! binding request and parse a binding success response's mapped address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use rand::RngCore;

use crate::{Error, Result};

/// The fixed magic cookie every STUN message header begins with.
pub const MAGIC_COOKIE: u32 = 0x2112_A442;

const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;

/// A 96-bit STUN transaction identifier.
pub type TransactionId = [u8; 12];

/// Generates a fresh random transaction ID.
pub fn new_transaction_id() -> TransactionId {
    let mut id = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut id);
    id
}

/// Encodes a zero-attribute binding request.
pub fn encode_binding_request(transaction_id: TransactionId) -> Vec<u8> {
    let mut out = Vec::with_capacity(20);
    out.extend_from_slice(&BINDING_REQUEST.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
    out.extend_from_slice(&transaction_id);
    out
}

/// Parses a binding response, returning the mapped address. Prefers
/// XOR-MAPPED-ADDRESS over MAPPED-ADDRESS when both are present, per RFC
/// 5389 §15.2.
pub fn parse_binding_response(bytes: &[u8], expected_txn: TransactionId) -> Result<SocketAddr> {
    if bytes.len() < 20 {
        return Err(Error::MalformedMessage);
    }
    let message_type = u16::from_be_bytes([bytes[0], bytes[1]]);
    let length = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
    let cookie = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let txn: TransactionId = bytes[8..20].try_into().expect("slice is exactly 12 bytes");

    if cookie != MAGIC_COOKIE || txn != expected_txn {
        return Err(Error::TransactionMismatch);
    }
    if message_type != BINDING_SUCCESS {
        return Err(Error::MalformedMessage);
    }
    if bytes.len() < 20 + length {
        return Err(Error::MalformedMessage);
    }

    let mut attrs = &bytes[20..20 + length];
    let mut mapped = None;
    let mut xor_mapped = None;

    while attrs.len() >= 4 {
        let attr_type = u16::from_be_bytes([attrs[0], attrs[1]]);
        let attr_len = u16::from_be_bytes([attrs[2], attrs[3]]) as usize;
        let padded = attr_len.div_ceil(4) * 4;
        if attrs.len() < 4 + padded {
            break;
        }
        let value = &attrs[4..4 + attr_len];
        match attr_type {
            ATTR_MAPPED_ADDRESS => mapped = parse_mapped_address(value),
            ATTR_XOR_MAPPED_ADDRESS => xor_mapped = parse_xor_mapped_address(value, txn),
            _ => {}
        }
        attrs = &attrs[4 + padded..];
    }

    xor_mapped.or(mapped).ok_or(Error::NoMappedAddress)
}

fn parse_mapped_address(value: &[u8]) -> Option<SocketAddr> {
    if value.len() < 4 {
        return None;
    }
    let family = value[1];
    let port = u16::from_be_bytes([value[2], value[3]]);
    match family {
        FAMILY_IPV4 if value.len() >= 8 => {
            let ip = Ipv4Addr::new(value[4], value[5], value[6], value[7]);
            Some(SocketAddr::new(IpAddr::V4(ip), port))
        }
        FAMILY_IPV6 if value.len() >= 20 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[4..20]);
            Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => None,
    }
}

fn parse_xor_mapped_address(value: &[u8], txn: TransactionId) -> Option<SocketAddr> {
    if value.len() < 4 {
        return None;
    }
    let family = value[1];
    let cookie_bytes = MAGIC_COOKIE.to_be_bytes();
    let port = u16::from_be_bytes([value[2], value[3]]) ^ u16::from_be_bytes([cookie_bytes[0], cookie_bytes[1]]);
    match family {
        FAMILY_IPV4 if value.len() >= 8 => {
            let mut xored = [0u8; 4];
            for i in 0..4 {
                xored[i] = value[4 + i] ^ cookie_bytes[i];
            }
            Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(xored)), port))
        }
        FAMILY_IPV6 if value.len() >= 20 => {
            let mut key = [0u8; 16];
            key[0..4].copy_from_slice(&cookie_bytes);
            key[4..16].copy_from_slice(&txn);
            let mut xored = [0u8; 16];
            for i in 0..16 {
                xored[i] = value[4 + i] ^ key[i];
            }
            Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(xored)), port))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_success_with_xor_mapped(txn: TransactionId, addr: SocketAddr) -> Vec<u8> {
        let cookie_bytes = MAGIC_COOKIE.to_be_bytes();
        let port = match addr {
            SocketAddr::V4(v4) => v4.port(),
            SocketAddr::V6(v6) => v6.port(),
        };
        let xor_port = port ^ u16::from_be_bytes([cookie_bytes[0], cookie_bytes[1]]);

        let mut attr_value = vec![0u8, FAMILY_IPV4];
        attr_value.extend_from_slice(&xor_port.to_be_bytes());
        if let SocketAddr::V4(v4) = addr {
            let octets = v4.ip().octets();
            for i in 0..4 {
                attr_value.push(octets[i] ^ cookie_bytes[i]);
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&BINDING_SUCCESS.to_be_bytes());
        out.extend_from_slice(&((4 + attr_value.len()) as u16).to_be_bytes());
        out.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        out.extend_from_slice(&txn);
        out.extend_from_slice(&ATTR_XOR_MAPPED_ADDRESS.to_be_bytes());
        out.extend_from_slice(&(attr_value.len() as u16).to_be_bytes());
        out.extend_from_slice(&attr_value);
        out
    }

    #[test]
    fn binding_request_carries_cookie_and_transaction_id() {
        let txn = [7u8; 12];
        let bytes = encode_binding_request(txn);
        assert_eq!(bytes.len(), 20);
        assert_eq!(u16::from_be_bytes([bytes[0], bytes[1]]), BINDING_REQUEST);
        assert_eq!(
            u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            MAGIC_COOKIE
        );
        assert_eq!(&bytes[8..20], &txn);
    }

    #[test]
    fn parses_xor_mapped_address_from_a_synthetic_response() {
        let txn = new_transaction_id();
        let addr: SocketAddr = "203.0.113.5:54321".parse().unwrap();
        let response = encode_success_with_xor_mapped(txn, addr);
        let parsed = parse_binding_response(&response, txn).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn rejects_mismatched_transaction_id() {
        let txn = new_transaction_id();
        let other = new_transaction_id();
        let addr: SocketAddr = "203.0.113.5:1".parse().unwrap();
        let response = encode_success_with_xor_mapped(txn, addr);
        let err = parse_binding_response(&response, other).unwrap_err();
        assert!(matches!(err, Error::TransactionMismatch));
    }

    #[test]
    fn rejects_short_input() {
        let err = parse_binding_response(&[0u8; 10], [0u8; 12]).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage));
    }
}
