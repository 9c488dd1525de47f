//! # netquery-core
//!
//! Shared library for netquery containing the query protocol codec, the game
//! identifiers carried in query responses, and the discovery target registry.
//!
//! This crate has zero dependencies on OS APIs or network sockets.  The
//! `netquery` crate drives it from real UDP sockets; tests drive it from
//! in-memory fakes.
//!
//! # Architecture overview (for beginners)
//!
//! A game server on the local network answers a tiny "who are you?" packet
//! (a *query*) with a short status report (a *query response*): how many
//! players are connected, which game it is running, and a free-text
//! description.  Discovering servers is therefore a matter of sending queries,
//! either to one known address or as a LAN broadcast, and collecting the
//! answers.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel over the network.  Packets carry a
//!   2-byte type tag followed by an optional payload, and are decoded back
//!   into typed Rust structs on the other end.
//!
//! - **`domain`** – Pure bookkeeping with no I/O.  The `TargetRegistry` tracks
//!   every address being queried and where it is in the query lifecycle.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `netquery_core::TargetRegistry` instead of the full module path.
pub use domain::game::{game_description, GameMission, GameMode};
pub use domain::target::{Endpoint, Target, TargetId, TargetKind, TargetRegistry, TargetState};
pub use protocol::codec::{decode_packet, encode_packet, ProtocolError};
pub use protocol::messages::{Packet, QueryData};
