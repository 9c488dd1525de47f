//! Query protocol packet types.
//!
//! Only the two packet kinds used for server discovery are modelled here.
//! Every other packet type that can arrive on a game port is reported by the
//! codec as [`crate::ProtocolError::UnknownPacketType`] and discarded by the
//! caller.

use serde::{Deserialize, Serialize};

use crate::domain::game::{GameMission, GameMode};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the packet type tag at the start of every packet.
pub const HEADER_SIZE: usize = 2;

/// Default UDP port game servers listen on.
pub const DEFAULT_PORT: u16 = 2342;

/// Largest datagram a query response is expected to fit in.
pub const MAX_PACKET_SIZE: usize = 1500;

// ── Packet type codes ─────────────────────────────────────────────────────────

/// Packet type tags understood by the discovery protocol.
///
/// The numeric values are fixed by the game's network protocol, where the
/// query packets sit after the connection and game-data packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PacketType {
    Query = 13,
    QueryResponse = 14,
}

impl TryFrom<u16> for PacketType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            13 => Ok(PacketType::Query),
            14 => Ok(PacketType::QueryResponse),
            _ => Err(()),
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Status report returned by a server in a QUERY_RESPONSE packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryData {
    /// Server software version string.
    pub version: String,
    /// `true` when a game is already in progress on the server.
    pub server_running: bool,
    /// Number of players currently connected.
    pub num_players: u8,
    /// Maximum number of players the server accepts.
    pub max_players: u8,
    /// Game mode the server was started with.
    pub game_mode: GameMode,
    /// Game mission (IWAD family) the server was started with.
    pub game_mission: GameMission,
    /// Free-text server description.
    pub description: String,
}

/// A decoded discovery packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// QUERY (13): "tell me about yourself".  No payload.
    Query,
    /// QUERY_RESPONSE (14): the server's status report.
    QueryResponse(QueryData),
}

impl Packet {
    /// Returns the wire type tag for this packet.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Query => PacketType::Query,
            Packet::QueryResponse(_) => PacketType::QueryResponse,
        }
    }
}
