//! The priority-ordered NAT traversal cascade: direct reachability, UPnP
//! port mapping, STUN reflexive discovery, UDP hole punching, and relay
//! fallback, tried in that fixed order.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod attempt;
mod cascade;
mod config;
mod method;
mod reachability;
mod relay;

pub use attempt::{AttemptHistory, ConnectionAttempt, HISTORY_CAPACITY};
pub use cascade::{Cascade, EstablishContext};
pub use config::Config;
pub use method::{Method, PRIORITY_ORDER};
pub use reachability::is_directly_reachable;
pub use relay::RelayHandle;

/// Errors raised while establishing a connection through the cascade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Every enabled method was tried and failed; carries the last attempt.
    #[error("every enabled NAT traversal method failed, last attempt: {0:?}")]
    AllMethodsFailed(Box<ConnectionAttempt>),
    /// No method was enabled at all, so nothing was attempted.
    #[error("no NAT traversal methods are enabled")]
    NoMethodsEnabled,
    /// The caller's cancellation token was set between methods.
    #[error("cascade cancelled")]
    Cancelled,
}

/// This crate's result alias.
pub type Result<T> = std::result::Result<T, Error>;
