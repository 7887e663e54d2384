//! Tunables for the Noise session manager.

use std::time::Duration;

/// How long an incomplete handshake is kept before the reaper evicts it.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a completed session may sit idle before the reaper evicts it.
const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// How often the reaper sweeps the session map.
const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for [`crate::NoiseSessionManager`].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Maximum time a handshake may remain incomplete before eviction.
    pub handshake_timeout: Duration,
    /// Maximum time a completed session may go unused before eviction.
    pub session_idle_timeout: Duration,
    /// How often the background reaper runs.
    pub reap_interval: Duration,
    /// Whether packet types outside the Noise control range may be sent in
    /// the clear when no session is ready yet. Defaults to `false`: callers
    /// must wait for a handshake to complete rather than silently leak
    /// plaintext.
    pub allow_unencrypted_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            session_idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
            allow_unencrypted_fallback: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unencrypted_fallback_defaults_off() {
        assert!(!Config::default().allow_unencrypted_fallback);
    }

    #[test]
    fn handshake_timeout_defaults_to_ten_seconds() {
        assert_eq!(Config::default().handshake_timeout, Duration::from_secs(10));
    }
}
