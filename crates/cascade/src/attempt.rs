//! A single traversal attempt and the bounded history of recent attempts.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::method::Method;

/// The maximum number of attempts retained per [`crate::Cascade`] instance.
pub const HISTORY_CAPACITY: usize = 100;

/// A record of one traversal attempt, successful or not.
#[derive(Clone, Debug)]
pub struct ConnectionAttempt {
    /// Which strategy was tried.
    pub method: Method,
    /// Whether it succeeded.
    pub success: bool,
    /// A short cause string when `success` is false.
    pub error_cause: Option<String>,
    /// When the attempt began.
    pub started_at: Instant,
    /// How long the attempt took.
    pub duration: Duration,
    /// Our local address as observed for this attempt, if known.
    pub local_addr: Option<SocketAddr>,
    /// The peer's address this attempt targeted.
    pub remote_addr: SocketAddr,
}

impl ConnectionAttempt {
    /// Builds a successful attempt record.
    #[must_use]
    pub fn success(method: Method, remote_addr: SocketAddr, local_addr: Option<SocketAddr>, started_at: Instant) -> Self {
        Self {
            method,
            success: true,
            error_cause: None,
            started_at,
            duration: started_at.elapsed(),
            local_addr,
            remote_addr,
        }
    }

    /// Builds a failed attempt record.
    #[must_use]
    pub fn failure(method: Method, remote_addr: SocketAddr, started_at: Instant, cause: impl Into<String>) -> Self {
        Self {
            method,
            success: false,
            error_cause: Some(cause.into()),
            started_at,
            duration: started_at.elapsed(),
            local_addr: None,
            remote_addr,
        }
    }
}

/// A ring buffer retaining the most recent [`HISTORY_CAPACITY`] attempts.
#[derive(Debug, Default)]
pub struct AttemptHistory {
    entries: VecDeque<ConnectionAttempt>,
}

impl AttemptHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attempt, evicting the oldest entry once at capacity.
    pub fn push(&mut self, attempt: ConnectionAttempt) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(attempt);
    }

    /// Returns the retained attempts, oldest first.
    #[must_use]
    pub fn entries(&self) -> &VecDeque<ConnectionAttempt> {
        &self.entries
    }

    /// Number of attempts currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
