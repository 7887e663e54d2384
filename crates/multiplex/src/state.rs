//! The lifecycle states a multiplexed logical connection moves through.

/// State of one [`crate::Connection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Created but no traffic has flowed yet.
    Idle,
    /// A handshake or traversal attempt is in progress.
    Connecting,
    /// Ready to carry application packets.
    Connected,
    /// A close has been requested but not yet finalized.
    Disconnecting,
    /// Fully closed; eligible for reaping once also inactive.
    Disconnected,
    /// Failed in a way that will not self-recover; eligible for reaping.
    Error,
}

impl ConnectionState {
    /// Whether this state is a terminal one the reaper may collect once
    /// the connection has also been inactive long enough.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Error)
    }
}
