//! Wire encoding and mutual selection for a peer's advertised capability
//! set.

use std::time::{Duration, Instant};

use crate::request::HandshakeRequest;
use crate::version::ProtocolVersion;
use crate::{Error, Result};

/// What one peer advertises during version negotiation.
#[derive(Clone, Debug)]
pub struct Capabilities {
    /// Every version this peer is willing to speak.
    pub supported: Vec<ProtocolVersion>,
    /// The version this peer would prefer, if mutually supported.
    pub preferred: ProtocolVersion,
    /// Whether this peer will accept a downgrade to [`ProtocolVersion::Legacy`]
    /// if no richer mutual version exists.
    pub legacy_fallback: bool,
}

impl Capabilities {
    /// Encodes this capability set as a type-249 packet payload, using the
    /// wire-level [`HandshakeRequest`] framing (`spec.md` §3): the
    /// `legacy_fallback` flag rides in `legacy_tail` since the request
    /// framing has no dedicated field for it, and no Noise bytes are
    /// piggybacked — callers that want to save a round trip by attaching
    /// the first Noise-IK message should build a [`HandshakeRequest`]
    /// directly instead of going through this convenience encoding.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        HandshakeRequest {
            preferred: self.preferred,
            versions: self.supported.clone(),
            noise_bytes: Vec::new(),
            legacy_tail: vec![u8::from(self.legacy_fallback)],
        }
        .serialize()
    }

    /// Decodes a type-249 packet payload produced by [`Capabilities::encode`]
    /// (or any other well-formed [`HandshakeRequest`]; a missing
    /// `legacy_tail` byte is treated as `legacy_fallback = false`).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let request = HandshakeRequest::parse(bytes)?;
        let legacy_fallback = request.legacy_tail.first().is_some_and(|&b| b != 0);
        Ok(Self {
            supported: request.versions,
            preferred: request.preferred,
            legacy_fallback,
        })
    }
}

/// Deadline by which a negotiation must complete; beyond this, the caller
/// should treat the peer as unreachable for negotiation purposes.
#[derive(Clone, Copy, Debug)]
pub struct NegotiationDeadline {
    at: Instant,
}

impl NegotiationDeadline {
    /// Builds a deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(self) -> bool {
        Instant::now() >= self.at
    }

    /// Time remaining, or `Duration::ZERO` if already expired.
    #[must_use]
    pub fn remaining(self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Picks the best version both `local` and `peer` support.
///
/// Prefers each side's advertised `preferred` version when it is mutually
/// supported; otherwise falls back to the highest mutually-supported
/// version. When the two sets share nothing at all, [`ProtocolVersion::Legacy`]
/// is used as the floor (`spec.md` §4.H, §8: "`SelectBestVersion(peer_versions)`
/// returns `Legacy` as the floor when no mutual non-Legacy version exists")
/// provided either side set `legacy_fallback`; a selection that lands on
/// `Legacy` is logged at audit level via [`select_best_version`]'s downgrade
/// check.
///
/// # Errors
///
/// Returns [`Error::NoMutualVersion`] if the two sets share nothing and
/// neither side set `legacy_fallback`.
pub fn select_best_version(local: &Capabilities, peer: &Capabilities) -> Result<ProtocolVersion> {
    let mutual: Vec<ProtocolVersion> = local
        .supported
        .iter()
        .filter(|v| v.is_known() && peer.supported.contains(v))
        .copied()
        .collect();

    let best = if mutual.is_empty() {
        if !(local.legacy_fallback || peer.legacy_fallback) {
            return Err(Error::NoMutualVersion);
        }
        ProtocolVersion::Legacy
    } else {
        mutual.iter().copied().max().expect("mutual is non-empty")
    };

    if best == ProtocolVersion::Legacy {
        log_downgrade();
    }

    Ok(best)
}

#[cfg(feature = "tracing")]
fn log_downgrade() {
    tracing::warn!(target: "meshwire::negotiation", "negotiated protocol version downgraded to legacy");
}

#[cfg(not(feature = "tracing"))]
fn log_downgrade() {}
