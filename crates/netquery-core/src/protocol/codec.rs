//! Binary codec for encoding and decoding query protocol packets.
//!
//! Wire format:
//! ```text
//! [packet_type:2][payload:N]
//!
//! QUERY_RESPONSE payload:
//! [version:cstr][server_state:1][num_players:1][max_players:1]
//! [game_mode:1][game_mission:1][description:cstr]
//! ```
//! Multi-byte integers are big-endian.  Strings are NUL-terminated.  One
//! packet occupies one datagram; bytes after the decoded payload are ignored
//! so that newer servers can append fields.

use crate::domain::game::{GameMission, GameMode};
use crate::protocol::messages::{Packet, PacketType, QueryData, HEADER_SIZE};
use thiserror::Error;

/// Errors that can occur during packet encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The packet type tag is not a discovery packet.
    #[error("unknown packet type: {0}")]
    UnknownPacketType(u16),

    /// The payload could not be parsed (missing terminator, field out of range, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Packet`] into a byte vector including the type tag.
///
/// Strings containing interior NUL bytes are truncated at the first NUL, as
/// the receiving side would do.
///
/// # Examples
///
/// ```rust
/// use netquery_core::protocol::{decode_packet, encode_packet, Packet};
///
/// let bytes = encode_packet(&Packet::Query);
/// assert_eq!(bytes, vec![0x00, 0x0D]);
/// assert_eq!(decode_packet(&bytes).unwrap(), Packet::Query);
/// ```
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + 64);
    buf.extend_from_slice(&(packet.packet_type() as u16).to_be_bytes());

    match packet {
        Packet::Query => {} // empty payload
        Packet::QueryResponse(data) => encode_query_data(&mut buf, data),
    }
    buf
}

/// Decodes one [`Packet`] from a received datagram.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the tag is not a discovery packet or the
/// payload is malformed.
///
/// # Examples
///
/// ```rust
/// use netquery_core::protocol::{decode_packet, ProtocolError};
///
/// // SYN (type 0) is a valid game packet but not a discovery packet.
/// assert_eq!(decode_packet(&[0x00, 0x00]), Err(ProtocolError::UnknownPacketType(0)));
/// ```
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let tag = u16::from_be_bytes([bytes[0], bytes[1]]);
    let packet_type = PacketType::try_from(tag).map_err(|_| ProtocolError::UnknownPacketType(tag))?;

    let payload = &bytes[HEADER_SIZE..];
    match packet_type {
        PacketType::Query => Ok(Packet::Query),
        PacketType::QueryResponse => decode_query_data(payload).map(Packet::QueryResponse),
    }
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_query_data(buf: &mut Vec<u8>, d: &QueryData) {
    write_cstring(buf, &d.version);
    buf.push(if d.server_running { 0x01 } else { 0x00 });
    buf.push(d.num_players);
    buf.push(d.max_players);
    buf.push(d.game_mode as u8);
    buf.push(d.game_mission as u8);
    write_cstring(buf, &d.description);
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_query_data(p: &[u8]) -> Result<QueryData, ProtocolError> {
    let (version, off) = read_safe_cstring(p, 0)?;
    // server_state + num_players + max_players + game_mode + game_mission
    require_len(p, off + 5, "QueryResponse")?;
    let server_running = p[off] != 0;
    let num_players = p[off + 1];
    let max_players = p[off + 2];
    let game_mode = GameMode::try_from(p[off + 3]).map_err(|_| {
        ProtocolError::MalformedPayload(format!("unknown game mode: {}", p[off + 3]))
    })?;
    let game_mission = GameMission::try_from(p[off + 4]).map_err(|_| {
        ProtocolError::MalformedPayload(format!("unknown game mission: {}", p[off + 4]))
    })?;
    let (description, _) = read_safe_cstring(p, off + 5)?;

    Ok(QueryData {
        version,
        server_running,
        num_players,
        max_players,
        game_mode,
        game_mission,
        description,
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

/// Writes the string bytes up to the first interior NUL, then a terminator.
fn write_cstring(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    buf.extend_from_slice(&bytes[..end]);
    buf.push(0x00);
}

/// Reads a NUL-terminated string starting at `offset` and sanitises it.
///
/// Invalid UTF-8 is replaced and control characters other than newline are
/// stripped, so a hostile server cannot inject terminal escapes into the
/// listing.  Returns the string and the offset of the byte after the
/// terminator.
fn read_safe_cstring(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    let rest = buf.get(offset..).unwrap_or_default();
    let len = rest.iter().position(|&b| b == 0).ok_or_else(|| {
        ProtocolError::MalformedPayload(format!("unterminated string at offset {offset}"))
    })?;
    let s = String::from_utf8_lossy(&rest[..len])
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();
    Ok((s, offset + len + 1))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> QueryData {
        QueryData {
            version: "Chocolate Doom 3.0.1".to_string(),
            server_running: false,
            num_players: 1,
            max_players: 8,
            game_mode: GameMode::Commercial,
            game_mission: GameMission::Doom2,
            description: "Game".to_string(),
        }
    }

    // ── Query ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_query_encodes_as_bare_type_tag() {
        assert_eq!(encode_packet(&Packet::Query), vec![0x00, 13]);
    }

    #[test]
    fn test_query_with_trailing_bytes_still_decodes() {
        assert_eq!(decode_packet(&[0x00, 13, 0xFF, 0xFF]).unwrap(), Packet::Query);
    }

    // ── QueryResponse ─────────────────────────────────────────────────────────

    #[test]
    fn test_query_response_round_trip() {
        let packet = Packet::QueryResponse(sample_data());
        let bytes = encode_packet(&packet);
        assert_eq!(decode_packet(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_query_response_byte_layout() {
        // Arrange
        let data = QueryData {
            version: "v".to_string(),
            server_running: true,
            num_players: 2,
            max_players: 4,
            game_mode: GameMode::Retail,
            game_mission: GameMission::Doom,
            description: "hi".to_string(),
        };

        // Act
        let bytes = encode_packet(&Packet::QueryResponse(data));

        // Assert
        assert_eq!(
            bytes,
            vec![0x00, 14, b'v', 0, 1, 2, 4, 3, 0, b'h', b'i', 0]
        );
    }

    #[test]
    fn test_query_response_ignores_appended_fields() {
        let mut bytes = encode_packet(&Packet::QueryResponse(sample_data()));
        bytes.extend_from_slice(&[0x02, 0xAA, 0xBB]);
        assert_eq!(decode_packet(&bytes).unwrap(), Packet::QueryResponse(sample_data()));
    }

    #[test]
    fn test_interior_nul_truncates_string_on_encode() {
        let mut data = sample_data();
        data.description = "abc\0def".to_string();
        let decoded = decode_packet(&encode_packet(&Packet::QueryResponse(data))).unwrap();
        match decoded {
            Packet::QueryResponse(d) => assert_eq!(d.description, "abc"),
            other => panic!("expected QueryResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_control_characters_are_stripped_on_decode() {
        // Arrange: description contains an ANSI escape and a newline
        let mut bytes = vec![0x00, 14, b'v', 0, 0, 0, 4, 2, 1];
        bytes.extend_from_slice(b"\x1b[2Jmy\nserver\x07");
        bytes.push(0);

        // Act
        let packet = decode_packet(&bytes).unwrap();

        // Assert
        match packet {
            Packet::QueryResponse(d) => assert_eq!(d.description, "[2Jmy\nserver"),
            other => panic!("expected QueryResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_replaced_not_rejected() {
        let bytes = vec![0x00, 14, 0xFF, 0, 0, 0, 4, 2, 1, b'x', 0];
        let packet = decode_packet(&bytes).unwrap();
        match packet {
            Packet::QueryResponse(d) => assert_eq!(d.version, "\u{FFFD}"),
            other => panic!("expected QueryResponse, got {other:?}"),
        }
    }

    // ── Malformed input ───────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_bytes_returns_insufficient_data() {
        assert_eq!(
            decode_packet(&[]),
            Err(ProtocolError::InsufficientData { needed: 2, available: 0 })
        );
    }

    #[test]
    fn test_decode_single_byte_returns_insufficient_data() {
        assert!(matches!(
            decode_packet(&[0x00]),
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_decode_unknown_packet_type_returns_error() {
        assert_eq!(
            decode_packet(&[0x00, 0x06]),
            Err(ProtocolError::UnknownPacketType(6))
        );
    }

    #[test]
    fn test_decode_response_without_version_terminator_is_malformed() {
        assert!(matches!(
            decode_packet(&[0x00, 14, b'v', b'1']),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_truncated_fixed_fields_is_malformed() {
        assert!(matches!(
            decode_packet(&[0x00, 14, b'v', 0, 0, 1]),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_missing_description_is_malformed() {
        assert!(matches!(
            decode_packet(&[0x00, 14, b'v', 0, 0, 1, 4, 2, 1]),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_unknown_game_mode_is_malformed() {
        let result = decode_packet(&[0x00, 14, b'v', 0, 0, 1, 4, 99, 1, 0]);
        assert_eq!(
            result,
            Err(ProtocolError::MalformedPayload("unknown game mode: 99".to_string()))
        );
    }

    #[test]
    fn test_decode_unknown_game_mission_is_malformed() {
        let result = decode_packet(&[0x00, 14, b'v', 0, 0, 1, 4, 2, 42, 0]);
        assert_eq!(
            result,
            Err(ProtocolError::MalformedPayload("unknown game mission: 42".to_string()))
        );
    }
}
