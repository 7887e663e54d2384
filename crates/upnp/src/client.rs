//! High-level UPnP IGD client tying discovery, description and SOAP
//! together.

use std::net::Ipv4Addr;
use std::sync::RwLock;
use std::time::Duration;

use crate::{description, soap, ssdp, Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [`IgdClient`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Timeout applied to SSDP discovery, the description fetch and each
    /// SOAP call.
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A UPnP IGD client. `discover` must succeed once before
/// [`IgdClient::add_port_mapping`] and friends will work.
pub struct IgdClient {
    config: Config,
    control_url: RwLock<Option<String>>,
}

impl IgdClient {
    /// Builds a client with no control URL yet resolved.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            control_url: RwLock::new(None),
        }
    }

    /// Runs SSDP discovery and fetches the device description, caching the
    /// resolved `WANIPConnection:1` control URL.
    pub fn discover(&self) -> Result<()> {
        let location = ssdp::discover(self.config.timeout)?;
        let control_url = description::fetch_control_url(&location, self.config.timeout)?;
        *self.control_url.write().expect("control_url lock poisoned") = Some(control_url);
        Ok(())
    }

    /// Whether a control URL has been resolved by a prior call to
    /// [`IgdClient::discover`].
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.control_url
            .read()
            .expect("control_url lock poisoned")
            .is_some()
    }

    fn control_url(&self) -> Result<String> {
        self.control_url
            .read()
            .expect("control_url lock poisoned")
            .clone()
            .ok_or(Error::NotDiscovered)
    }

    /// Requests a port forward from `external_port` to
    /// `internal_ip:internal_port` for `protocol` ("TCP" or "UDP"), held for
    /// `lease` (rounded to whole seconds; zero means no expiry).
    pub fn add_port_mapping(
        &self,
        external_port: u16,
        internal_ip: Ipv4Addr,
        internal_port: u16,
        protocol: &str,
        description: &str,
        lease: Duration,
    ) -> Result<()> {
        let control_url = self.control_url()?;
        soap::invoke(
            &control_url,
            "AddPortMapping",
            &[
                ("NewRemoteHost", String::new()),
                ("NewExternalPort", external_port.to_string()),
                ("NewProtocol", protocol.to_string()),
                ("NewInternalPort", internal_port.to_string()),
                ("NewInternalClient", internal_ip.to_string()),
                ("NewEnabled", "1".to_string()),
                ("NewPortMappingDescription", description.to_string()),
                ("NewLeaseDuration", lease.as_secs().to_string()),
            ],
            self.config.timeout,
        )?;
        Ok(())
    }

    /// Removes a previously added port forward.
    pub fn delete_port_mapping(&self, external_port: u16, protocol: &str) -> Result<()> {
        let control_url = self.control_url()?;
        soap::invoke(
            &control_url,
            "DeletePortMapping",
            &[
                ("NewRemoteHost", String::new()),
                ("NewExternalPort", external_port.to_string()),
                ("NewProtocol", protocol.to_string()),
            ],
            self.config.timeout,
        )?;
        Ok(())
    }

    /// Asks the gateway for its current external IPv4 address.
    pub fn get_external_ip(&self) -> Result<Ipv4Addr> {
        let control_url = self.control_url()?;
        let result = soap::invoke(&control_url, "GetExternalIPAddress", &[], self.config.timeout)?;
        result
            .get("NewExternalIPAddress")
            .and_then(|value| value.parse().ok())
            .ok_or(Error::MalformedResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_fail_before_discovery() {
        let client = IgdClient::new(Config::default());
        assert!(!client.is_available());
        let err = client
            .add_port_mapping(1234, Ipv4Addr::new(192, 168, 1, 5), 1234, "TCP", "test", Duration::from_secs(3600))
            .unwrap_err();
        assert!(matches!(err, Error::NotDiscovered));
    }

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(Config::default().timeout, Duration::from_secs(10));
    }
}
