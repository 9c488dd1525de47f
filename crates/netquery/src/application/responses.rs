//! Response handler: turns inbound datagrams into reported servers.
//!
//! # Handling one datagram
//!
//! 1. Decode.  Anything that is not a well-formed QUERY_RESPONSE is protocol
//!    noise on a shared game port and is dropped without surfacing an error.
//! 2. Find the target registered for the sender.
//! 3. If there is none, the datagram may be an answer to our broadcast: if the
//!    broadcast target is currently `Queried`, the sender is *promoted* to a
//!    new server target whose send time is copied from the broadcast.  The
//!    reported ping is therefore "time since the broadcast went out", not a
//!    per-server round trip.
//! 4. If the target is waiting for an answer, record it and invoke the
//!    callback.  A target only accepts one answer, so duplicates never
//!    produce a second callback.

use std::fmt;
use std::ops::ControlFlow;

use netquery_core::{
    decode_packet, Endpoint, Packet, QueryData, TargetId, TargetRegistry, TargetState,
};
use tracing::{debug, trace};

/// What happened to one inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The datagram was a first answer from a target; the callback ran.
    Reported {
        target: TargetId,
        ping_ms: u32,
        /// Whether the callback asked the loop to stop.
        flow: ControlFlow<()>,
    },
    /// The target already answered (or had given up); no callback.
    Duplicate(TargetId),
    /// Nobody asked this sender and no broadcast is in flight.
    Unsolicited,
    /// Not a well-formed QUERY_RESPONSE.
    Discarded,
}

/// Handles one datagram received from `from` at `now_ms`.
///
/// `on_response` is invoked at most once per target over the session, and
/// only from here.
pub fn handle_datagram<A, F>(
    registry: &mut TargetRegistry<A>,
    from: &A,
    bytes: &[u8],
    now_ms: u64,
    on_response: &mut F,
) -> ResponseOutcome
where
    A: Clone + Eq + fmt::Debug,
    F: FnMut(&A, &QueryData, u32) -> ControlFlow<()>,
{
    let data = match decode_packet(bytes) {
        Ok(Packet::QueryResponse(data)) => data,
        Ok(other) => {
            trace!(?from, packet = ?other.packet_type(), "ignoring non-response packet");
            return ResponseOutcome::Discarded;
        }
        Err(e) => {
            trace!(?from, "discarding undecodable datagram: {e}");
            return ResponseOutcome::Discarded;
        }
    };

    let endpoint = Endpoint::Server(from.clone());
    let id = match registry.find_or_create(&endpoint, false) {
        Some(id) => id,
        None => match promote_broadcast_responder(registry, endpoint) {
            Some(id) => id,
            None => {
                debug!(?from, "dropping unsolicited query response");
                return ResponseOutcome::Unsolicited;
            }
        },
    };

    let Some(target) = registry.get_mut(id) else {
        return ResponseOutcome::Unsolicited;
    };
    match target.record_response(data.clone(), now_ms) {
        Some(ping_ms) => {
            debug!(?from, ping_ms, "server responded");
            let flow = on_response(from, &data, ping_ms);
            ResponseOutcome::Reported {
                target: id,
                ping_ms,
                flow,
            }
        }
        None => {
            trace!(?from, state = ?target.state(), "ignoring repeated response");
            ResponseOutcome::Duplicate(id)
        }
    }
}

/// Creates a server target for an unknown sender if a broadcast is in flight.
fn promote_broadcast_responder<A>(
    registry: &mut TargetRegistry<A>,
    endpoint: Endpoint<A>,
) -> Option<TargetId>
where
    A: Clone + Eq + fmt::Debug,
{
    let broadcast_id = registry.find(&Endpoint::Broadcast)?;
    let broadcast = registry.get(broadcast_id)?;
    if broadcast.state() != TargetState::Queried {
        return None;
    }
    let broadcast_sent_ms = broadcast.last_query_ms();

    let id = registry.register(endpoint);
    registry.get_mut(id)?.adopt_broadcast_query(broadcast_sent_ms);
    Some(id)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
