//! Application layer: the discovery protocol engine.
//!
//! Nothing in this layer opens a socket or reads the system clock.  It
//! depends on the [`ports::Transport`] and [`ports::Clock`] traits, so the
//! same engine runs against real UDP sockets in the binary and against
//! in-memory fakes in tests.
//!
//! # Sub-modules
//!
//! - **`ports`** – The `Transport` and `Clock` abstractions.
//!
//! - **`scheduler`** – Decides, once per tick, which target (if any) gets a
//!   query, and enforces the session-wide send interval.
//!
//! - **`responses`** – Decodes inbound packets, matches them to targets,
//!   promotes broadcast answers into new targets, and fires the result
//!   callback exactly once per target.
//!
//! - **`timeouts`** – Gives up on targets whose retry budget is exhausted.
//!
//! - **`query_session`** – The session driver: `poll`, the blocking
//!   `run_until_done` loop, and cooperative cancellation.
//!
//! - **`search`** – The entry points built on the session: collect every LAN
//!   server, find the first LAN server, or wait for one specific address.

pub mod ports;
pub mod query_session;
pub mod responses;
pub mod scheduler;
pub mod search;
pub mod timeouts;
