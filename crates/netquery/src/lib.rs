//! netquery library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does netquery do? (for beginners)
//!
//! Game servers on a LAN answer a small QUERY packet with a status report.
//! netquery finds them:
//!
//! 1. It registers *targets*: either one known server address, or a single
//!    "broadcast" target meaning "everyone on the local network".
//! 2. On every poll tick it sends at most one query, retries targets that
//!    have not answered within two seconds, and gives up after three
//!    attempts.
//! 3. Every server that answers is reported exactly once through a callback,
//!    together with its round-trip time.  Servers that answer a broadcast are
//!    added to the target list on the fly.
//!
//! The protocol engine lives in [`application`] and only talks to the outside
//! world through the [`application::ports`] traits; [`infrastructure`]
//! provides the UDP socket, clocks, config file, and terminal output.

/// Application layer: the query engine and the search use cases.
pub mod application;

/// Infrastructure layer: sockets, clocks, config storage, and presentation.
pub mod infrastructure;
