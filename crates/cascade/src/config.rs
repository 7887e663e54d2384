//! Cascade configuration: which methods are enabled and the per-method
//! client settings they delegate to.

use std::collections::HashMap;
use std::time::Duration;

use crate::method::Method;

/// The UPnP port mapping lifetime the cascade requests.
pub const UPNP_MAPPING_DURATION: Duration = Duration::from_secs(3600);

/// Controls which traversal methods [`crate::Cascade::establish`] will try,
/// and the settings handed to each method's underlying client.
#[derive(Clone, Debug)]
pub struct Config {
    /// Per-method enable flags. A method absent from the map is treated as
    /// enabled, except [`Method::Relay`], which defaults to disabled.
    pub enabled: HashMap<Method, bool>,
    /// Settings passed to the STUN client.
    pub stun: meshwire_stun::Config,
    /// Settings passed to the hole puncher.
    pub holepunch: meshwire_holepunch::Config,
}

impl Config {
    /// Whether `method` is enabled under this configuration.
    #[must_use]
    pub fn is_enabled(&self, method: Method) -> bool {
        *self
            .enabled
            .get(&method)
            .unwrap_or(&(method != Method::Relay))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: HashMap::new(),
            stun: meshwire_stun::Config::default(),
            holepunch: meshwire_holepunch::Config::default(),
        }
    }
}
