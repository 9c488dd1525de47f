//! Network infrastructure.
//!
//! # Sub-modules
//!
//! - **`udp`** – [`udp::UdpTransport`], the production [`Transport`] over a
//!   non-blocking, broadcast-enabled UDP socket.
//!
//! - **`memory`** – [`memory::MemoryTransport`], an in-memory transport for
//!   tests that can simulate LAN servers answering queries.
//!
//! - **`responder`** – The server side of the protocol: a background thread
//!   that answers every QUERY with a configured QUERY_RESPONSE.  Used by
//!   `netquery serve` and by the loopback integration tests.
//!
//! [`Transport`]: crate::application::ports::Transport

pub mod memory;
pub mod responder;
pub mod udp;

use std::net::SocketAddr;

use thiserror::Error;

/// Error type for socket setup.
///
/// Errors that happen while a query loop or responder is running are logged,
/// not returned; only failures to get a working socket surface here.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The UDP socket could not be bound.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A socket option (non-blocking mode, broadcast, read timeout) could not
    /// be set.
    #[error("failed to configure UDP socket ({option}): {source}")]
    Configure {
        option: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The responder thread could not be started.
    #[error("failed to spawn responder thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A host name did not resolve to any IPv4 or IPv6 address.
    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },
}
