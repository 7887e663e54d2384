//! Relay fallback is the lowest-priority method and the only one whose wire
//! protocol this workspace does not define; callers supply a live
//! [`RelayHandle`] instead.

use std::net::SocketAddr;

/// A caller-supplied connection to a relay server.
///
/// This crate has no opinion on how a relay session is established, framed,
/// or authenticated; it only needs to know whether one is available and
/// able to reach a given peer through it. Implementations typically wrap
/// whatever relay-specific client the application already maintains.
pub trait RelayHandle: Send + Sync {
    /// Whether the relay connection is currently live.
    fn is_connected(&self) -> bool;

    /// Whether the relay can forward traffic toward `remote_addr`.
    fn can_reach(&self, remote_addr: SocketAddr) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDown;
    impl RelayHandle for AlwaysDown {
        fn is_connected(&self) -> bool {
            false
        }
        fn can_reach(&self, _remote_addr: SocketAddr) -> bool {
            false
        }
    }

    #[test]
    fn stub_handle_reports_disconnected() {
        let handle = AlwaysDown;
        assert!(!handle.is_connected());
    }
}
