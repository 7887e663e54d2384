//! Minimal UPnP Internet Gateway Device client.
//!
//! # Overview
//!
//! Three steps, each intentionally hand-rolled rather than pulled in from a
//! general-purpose HTTP/XML stack (no gateway on the discovery path speaks
//! anything beyond what's needed here, and pulling in a full HTTP client for
//! one GET and one POST is more machinery than the problem warrants):
//!
//! 1. [`ssdp::discover`] sends an SSDP `M-SEARCH` to the local multicast
//!    group and collects `LOCATION` headers from responding gateways.
//! 2. [`description::fetch_control_url`] fetches the device description XML
//!    at that location and scans it for the `WANIPConnection:1` service's
//!    control URL.
//! 3. [`IgdClient`] issues SOAP actions (`AddPortMapping`,
//!    `DeletePortMapping`, `GetExternalIPAddress`) against that control URL.
//!
//! # Errors
//!
//! Operations that require a control URL fail with
//! [`Error::NoControlUrl`] until discovery has located one.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod client;
mod description;
mod soap;
mod ssdp;

pub use client::{Config, IgdClient};

use thiserror::Error;

/// Errors raised by the UPnP client.
#[derive(Debug, Error)]
pub enum Error {
    /// No gateway answered the SSDP discovery within its timeout.
    #[error("no UPnP gateway responded to discovery")]
    NoGatewayFound,
    /// The device description did not advertise a `WANIPConnection:1`
    /// control URL.
    #[error("gateway description did not advertise a WANIPConnection control URL")]
    NoControlUrl,
    /// An operation was attempted before discovery located a control URL.
    #[error("no control URL available; call discover() first")]
    NotDiscovered,
    /// The gateway responded with a SOAP fault.
    #[error("gateway rejected the request: {detail}")]
    SoapFault {
        /// The fault detail extracted from the response body.
        detail: String,
    },
    /// The HTTP response could not be parsed.
    #[error("malformed HTTP response from gateway")]
    MalformedResponse,
    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Error>;
