//! The fixed priority order of NAT-traversal strategies.

use std::fmt;

/// One NAT-traversal strategy. Ordered by declaration, which is also the
/// fixed priority the cascade tries them in: [`Method::Direct`] first,
/// [`Method::Relay`] last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// Both peers are already publicly reachable; no traversal needed.
    Direct,
    /// Ask a local IGD to map our port to a public one.
    Upnp,
    /// Learn our own reflexive address from a STUN server.
    Stun,
    /// Coordinated simultaneous UDP probes toward the peer's reported address.
    HolePunch,
    /// Fall back to a relay server neither peer needs to be reachable by.
    Relay,
}

/// The fixed attempt order, highest priority first.
pub const PRIORITY_ORDER: [Method; 5] = [
    Method::Direct,
    Method::Upnp,
    Method::Stun,
    Method::HolePunch,
    Method::Relay,
];

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Direct => "direct",
            Method::Upnp => "upnp",
            Method::Stun => "stun",
            Method::HolePunch => "hole-punch",
            Method::Relay => "relay",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_starts_direct_and_ends_relay() {
        assert_eq!(PRIORITY_ORDER[0], Method::Direct);
        assert_eq!(PRIORITY_ORDER[PRIORITY_ORDER.len() - 1], Method::Relay);
    }
}
