//! The priority-ordered NAT traversal cascade.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use meshwire_wire::control::CancellationToken;
use meshwire_upnp::IgdClient;

use crate::attempt::{AttemptHistory, ConnectionAttempt};
use crate::config::{Config, UPNP_MAPPING_DURATION};
use crate::method::{Method, PRIORITY_ORDER};
use crate::reachability::is_directly_reachable;
use crate::relay::RelayHandle;
use crate::{Error, Result};

/// Everything a single [`Cascade::establish`] call needs that is specific
/// to that call rather than to the cascade as a whole.
pub struct EstablishContext {
    /// Our own address as observed locally (used for the Direct method's
    /// reachability check).
    pub local_addr: SocketAddr,
    /// Checked between methods; cancelling aborts the cascade immediately.
    pub cancellation: CancellationToken,
}

/// Runs NAT-traversal methods in fixed priority order against a remote peer.
pub struct Cascade {
    config: Config,
    upnp: IgdClient,
    relay: Option<Arc<dyn RelayHandle>>,
    history: Mutex<AttemptHistory>,
}

impl Cascade {
    /// Builds a cascade with the given configuration and an optional relay
    /// handle (absent handles make the Relay method always fail).
    #[must_use]
    pub fn new(config: Config, relay: Option<Arc<dyn RelayHandle>>) -> Self {
        Self {
            config,
            upnp: IgdClient::new(meshwire_upnp::Config::default()),
            relay,
            history: Mutex::new(AttemptHistory::new()),
        }
    }

    /// Tries each enabled method in priority order against `remote_addr`,
    /// recording every attempt. Returns the first success; if every enabled
    /// method fails, returns [`Error::AllMethodsFailed`] wrapping the last
    /// attempt made. Cancelling `context.cancellation` between methods
    /// aborts immediately with [`Error::Cancelled`].
    pub fn establish(&self, context: &EstablishContext, remote_addr: SocketAddr) -> Result<ConnectionAttempt> {
        let mut last_attempt: Option<ConnectionAttempt> = None;

        for method in PRIORITY_ORDER {
            if !self.config.is_enabled(method) {
                continue;
            }
            if context.cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let attempt = self.try_method(method, context, remote_addr);
            self.history.lock().expect("history lock poisoned").push(attempt.clone());

            if attempt.success {
                return Ok(attempt);
            }
            last_attempt = Some(attempt);
        }

        match last_attempt {
            Some(attempt) => Err(Error::AllMethodsFailed(Box::new(attempt))),
            None => Err(Error::NoMethodsEnabled),
        }
    }

    fn try_method(&self, method: Method, context: &EstablishContext, remote_addr: SocketAddr) -> ConnectionAttempt {
        let started_at = Instant::now();
        match method {
            Method::Direct => self.try_direct(context, remote_addr, started_at),
            Method::Upnp => self.try_upnp(context, remote_addr, started_at),
            Method::Stun => self.try_stun(context, remote_addr, started_at),
            Method::HolePunch => self.try_hole_punch(context, remote_addr, started_at),
            Method::Relay => self.try_relay(remote_addr, started_at),
        }
    }

    fn try_direct(&self, context: &EstablishContext, remote_addr: SocketAddr, started_at: Instant) -> ConnectionAttempt {
        if is_directly_reachable(context.local_addr) && is_directly_reachable(remote_addr) {
            ConnectionAttempt::success(Method::Direct, remote_addr, Some(context.local_addr), started_at)
        } else {
            ConnectionAttempt::failure(Method::Direct, remote_addr, started_at, "not publicly reachable")
        }
    }

    fn try_upnp(&self, context: &EstablishContext, remote_addr: SocketAddr, started_at: Instant) -> ConnectionAttempt {
        let SocketAddr::V4(local) = context.local_addr else {
            return ConnectionAttempt::failure(Method::Upnp, remote_addr, started_at, "UPnP requires an IPv4 local address");
        };

        if !self.upnp.is_available() {
            if let Err(err) = self.upnp.discover() {
                return ConnectionAttempt::failure(Method::Upnp, remote_addr, started_at, err.to_string());
            }
        }

        let port = local.port();
        match self.upnp.add_port_mapping(port, *local.ip(), port, "UDP", "meshwire", UPNP_MAPPING_DURATION) {
            Ok(()) => ConnectionAttempt::success(Method::Upnp, remote_addr, Some(context.local_addr), started_at),
            Err(err) => ConnectionAttempt::failure(Method::Upnp, remote_addr, started_at, err.to_string()),
        }
    }

    fn try_stun(&self, context: &EstablishContext, remote_addr: SocketAddr, started_at: Instant) -> ConnectionAttempt {
        match meshwire_stun::discover_reflexive(context.local_addr, &self.config.stun) {
            Ok(reflexive) => ConnectionAttempt::success(Method::Stun, remote_addr, Some(reflexive), started_at),
            Err(err) => ConnectionAttempt::failure(Method::Stun, remote_addr, started_at, err.to_string()),
        }
    }

    fn try_hole_punch(&self, context: &EstablishContext, remote_addr: SocketAddr, started_at: Instant) -> ConnectionAttempt {
        match meshwire_holepunch::punch(context.local_addr, remote_addr, &self.config.holepunch) {
            Ok(meshwire_holepunch::Outcome::Success) => {
                ConnectionAttempt::success(Method::HolePunch, remote_addr, Some(context.local_addr), started_at)
            }
            Ok(other) => ConnectionAttempt::failure(Method::HolePunch, remote_addr, started_at, format!("{other:?}")),
            Err(err) => ConnectionAttempt::failure(Method::HolePunch, remote_addr, started_at, err.to_string()),
        }
    }

    fn try_relay(&self, remote_addr: SocketAddr, started_at: Instant) -> ConnectionAttempt {
        match &self.relay {
            Some(relay) if relay.is_connected() && relay.can_reach(remote_addr) => {
                ConnectionAttempt::success(Method::Relay, remote_addr, None, started_at)
            }
            _ => ConnectionAttempt::failure(Method::Relay, remote_addr, started_at, "relay unavailable"),
        }
    }

    /// Snapshot of every attempt recorded so far, oldest first, bounded to
    /// the last [`crate::attempt::HISTORY_CAPACITY`] entries.
    #[must_use]
    pub fn history(&self) -> Vec<ConnectionAttempt> {
        self.history
            .lock()
            .expect("history lock poisoned")
            .entries()
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EstablishContext {
        EstablishContext {
            local_addr: "8.8.8.8:9000".parse().unwrap(),
            cancellation: CancellationToken::new(),
        }
    }

    #[test]
    fn direct_succeeds_when_both_ends_are_public() {
        let cascade = Cascade::new(Config::default(), None);
        let attempt = cascade.establish(&ctx(), "203.0.114.9:9000".parse().unwrap()).unwrap();
        assert_eq!(attempt.method, Method::Direct);
        assert!(attempt.success);
    }

    #[test]
    fn cancellation_aborts_before_any_method_runs() {
        let cascade = Cascade::new(Config::default(), None);
        let mut context = ctx();
        context.cancellation.cancel();
        let err = cascade.establish(&context, "203.0.114.9:9000".parse().unwrap()).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn disabling_every_method_reports_no_methods_enabled() {
        let mut config = Config::default();
        for method in PRIORITY_ORDER {
            config.enabled.insert(method, false);
        }
        let cascade = Cascade::new(config, None);
        let err = cascade.establish(&ctx(), "203.0.114.9:9000".parse().unwrap()).unwrap_err();
        assert!(matches!(err, Error::NoMethodsEnabled));
    }

    #[test]
    fn history_retains_every_attempt_made() {
        let cascade = Cascade::new(Config::default(), None);
        cascade.establish(&ctx(), "203.0.114.9:9000".parse().unwrap()).unwrap();
        assert!(!cascade.history().is_empty());
    }
}
