//! UDP query responder: the server side of the discovery protocol.
//!
//! The responder binds a UDP socket (by default on the game port 2342) and
//! answers every QUERY datagram with a QUERY_RESPONSE carrying the configured
//! [`QueryData`].  For each answered query it emits a [`QueryEvent`] on an
//! internal channel so the caller can log or count incoming queries.
//!
//! The responder runs on a dedicated thread with blocking socket I/O, so it
//! never stalls the Tokio runtime.
//!
//! # Read timeout
//!
//! The socket has a 500 ms read timeout.  `recv_from` blocks for at most that
//! long before returning a timeout error; on each timeout the loop checks the
//! `running` flag and exits cleanly once it has been cleared.

use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use netquery_core::{
    decode_packet, encode_packet, protocol::messages::MAX_PACKET_SIZE, Packet, QueryData,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::NetworkError;

/// How long one `recv_from` may block before the `running` flag is checked.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Capacity of the event channel.  Events are dropped, not queued, once full.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A query the responder has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    /// Where the QUERY came from (and where the response went).
    pub from: SocketAddr,
    /// Whether the response was handed to the socket successfully.
    pub answered: bool,
}

/// A running responder.
#[derive(Debug)]
pub struct QueryResponder {
    local_addr: SocketAddr,
    events: mpsc::Receiver<QueryEvent>,
    thread: JoinHandle<()>,
}

impl QueryResponder {
    /// Address the responder is actually listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Channel of answered queries.
    pub fn events(&mut self) -> &mut mpsc::Receiver<QueryEvent> {
        &mut self.events
    }

    /// Waits for the responder thread to finish.  Clear the `running` flag
    /// first, or this blocks forever.
    pub fn join(self) {
        if self.thread.join().is_err() {
            error!("query responder thread panicked");
        }
    }
}

/// Binds `bind_addr` and spawns a background thread answering QUERY packets
/// with `data` until `running` is cleared.
///
/// # Errors
///
/// Returns [`NetworkError::BindFailed`] if the socket cannot be bound,
/// [`NetworkError::Configure`] if the read timeout cannot be set, and
/// [`NetworkError::Spawn`] if the thread cannot be started.
pub fn start_query_responder(
    bind_addr: SocketAddr,
    data: QueryData,
    running: Arc<AtomicBool>,
) -> Result<QueryResponder, NetworkError> {
    let socket = UdpSocket::bind(bind_addr).map_err(|source| NetworkError::BindFailed {
        addr: bind_addr,
        source,
    })?;
    socket
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|source| NetworkError::Configure {
            option: "read timeout",
            source,
        })?;
    let local_addr = socket.local_addr().map_err(|source| NetworkError::Configure {
        option: "local address",
        source,
    })?;

    let response = encode_packet(&Packet::QueryResponse(data));
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let thread = std::thread::Builder::new()
        .name("netquery-responder".to_string())
        .spawn(move || responder_loop(socket, response, tx, running))
        .map_err(NetworkError::Spawn)?;

    info!("query responder listening on UDP {local_addr}");
    Ok(QueryResponder {
        local_addr,
        events: rx,
        thread,
    })
}

/// The receive loop executed on the responder thread.
fn responder_loop(
    socket: UdpSocket,
    response: Vec<u8>,
    tx: mpsc::Sender<QueryEvent>,
    running: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                warn!("responder recv error: {e}");
                continue;
            }
        };

        match decode_packet(&buf[..len]) {
            Ok(Packet::Query) => {
                debug!("query from {src}");
                let answered = match socket.send_to(&response, src) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("failed to send query response to {src}: {e}");
                        false
                    }
                };
                if let Err(e) = tx.try_send(QueryEvent { from: src, answered }) {
                    trace!("query event not delivered: {e}");
                }
            }
            Ok(other) => {
                trace!("ignoring {:?} packet from {src}", other.packet_type());
            }
            Err(e) => {
                debug!("failed to decode datagram from {src}: {e}");
            }
        }
    }

    info!("query responder stopped");
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
