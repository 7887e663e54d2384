//! Aggregated configuration for an [`crate::Endpoint`].
//!
//! Each field delegates to the owning crate's own `Config` type; this
//! struct exists only to give callers one place to tune the whole object
//! graph instead of threading five separate configs through [`crate::Endpoint::bind`].

use std::net::SocketAddr;
use std::time::Duration;

use negotiation::{Capabilities, ProtocolVersion};

/// Tunables for every component an [`crate::Endpoint`] wires together.
///
/// Not `Serialize`/`Deserialize` even under the `serde` feature: the
/// [`Capabilities`] and [`cascade::Config`] fields it composes don't derive
/// it themselves (the former has no stable wire-independent shape, the
/// latter nests a `HashMap` keyed by a type from a crate with no serde
/// feature of its own).
#[derive(Clone, Debug)]
pub struct Config {
    /// Local address the underlying datagram socket binds to.
    pub bind_addr: SocketAddr,
    /// This node's advertised capabilities for version negotiation.
    pub local_capabilities: Capabilities,
    /// How long [`crate::Endpoint::negotiate`] waits for a peer's reply.
    pub negotiation_timeout: Duration,
    /// Noise session manager tunables.
    pub noise: noise::Config,
    /// NAT traversal cascade tunables.
    pub cascade: cascade::Config,
    /// Network monitor alert thresholds.
    pub monitor: monitor::Config,
    /// Connection multiplexer tunables, used only if the caller layers a
    /// [`multiplex::Multiplexer`] over a second endpoint of their own (see
    /// [`crate::Endpoint`]'s docs).
    pub multiplex: multiplex::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".parse().expect("valid default bind address"),
            local_capabilities: Capabilities {
                supported: vec![ProtocolVersion::Legacy, ProtocolVersion::NoiseIK],
                preferred: ProtocolVersion::NoiseIK,
                legacy_fallback: false,
            },
            negotiation_timeout: Duration::from_secs(5),
            noise: noise::Config::default(),
            cascade: cascade::Config::default(),
            monitor: monitor::Config::default(),
            multiplex: multiplex::Config::default(),
        }
    }
}
