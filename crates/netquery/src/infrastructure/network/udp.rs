//! Production UDP transport.
//!
//! The socket is non-blocking: `try_recv` returns `Ok(None)` straight away
//! when nothing is queued, which is what the cooperative poll loop needs.
//! Broadcast sends go to a configurable address (default
//! `255.255.255.255` on the game port).
//!
//! # Transient errors
//!
//! Some receive errors say nothing about the health of the socket:
//! `WouldBlock` just means "no datagram", and on Windows an ICMP port
//! unreachable from an earlier send surfaces as `ConnectionReset` on the next
//! receive.  Those are folded into `Ok(None)` so the engine does not log a
//! warning for every silent server.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use netquery_core::protocol::messages::MAX_PACKET_SIZE;
use tracing::{debug, info, trace};

use super::NetworkError;
use crate::application::ports::Transport;

/// Non-blocking UDP socket implementing [`Transport`].
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    broadcast_addr: SocketAddr,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Binds `bind_addr` and prepares the socket for broadcast queries.
    ///
    /// Bind to port 0 to let the OS pick a source port, as a querying client
    /// normally does.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address is unavailable and
    /// [`NetworkError::Configure`] if a socket option is rejected.
    pub fn bind(bind_addr: SocketAddr, broadcast_addr: SocketAddr) -> Result<Self, NetworkError> {
        let socket = UdpSocket::bind(bind_addr).map_err(|source| NetworkError::BindFailed {
            addr: bind_addr,
            source,
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| NetworkError::Configure {
                option: "non-blocking",
                source,
            })?;
        socket
            .set_broadcast(true)
            .map_err(|source| NetworkError::Configure {
                option: "broadcast",
                source,
            })?;

        info!(
            local = ?socket.local_addr().ok(),
            broadcast = %broadcast_addr,
            "query socket ready"
        );
        Ok(Self {
            socket,
            broadcast_addr,
            buf: vec![0u8; MAX_PACKET_SIZE],
        })
    }

    /// Address the socket is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    type Addr = SocketAddr;

    fn send_to(&mut self, addr: &SocketAddr, packet: &[u8]) -> io::Result<()> {
        self.socket.send_to(packet, addr).map(|_| ())
    }

    fn send_broadcast(&mut self, packet: &[u8]) -> io::Result<()> {
        self.socket.send_to(packet, self.broadcast_addr).map(|_| ())
    }

    fn try_recv(&mut self) -> io::Result<Option<(SocketAddr, Vec<u8>)>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, from)) => {
                trace!(%from, len, "datagram received");
                Ok(Some((from, self.buf[..len].to_vec())))
            }
            Err(e) if is_transient_error(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Returns `true` for receive errors that only mean "nothing usable yet".
fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
    )
}

/// Default broadcast destination for queries on `port`.
pub fn default_broadcast_addr(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port)
}

/// Resolves `HOST`, `HOST:PORT`, `IP`, `IP:PORT` or `[IPv6]:PORT` to a socket
/// address, using `default_port` when none is given.
///
/// IPv4 results are preferred, since broadcast discovery is IPv4-only.
///
/// # Errors
///
/// Returns [`NetworkError::Resolve`] if the name does not resolve.
pub fn resolve_server(host: &str, default_port: u16) -> Result<SocketAddr, NetworkError> {
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => {
            let port = port.parse::<u16>().map_err(|_| NetworkError::Resolve {
                host: host.to_string(),
                reason: format!("invalid port {port:?}"),
            })?;
            (name, port)
        }
        None => (host, default_port),
    };

    let candidates: Vec<SocketAddr> = (name, port)
        .to_socket_addrs()
        .map_err(|e| NetworkError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .collect();

    let chosen = candidates
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| NetworkError::Resolve {
            host: host.to_string(),
            reason: "no addresses found".to_string(),
        })?;

    debug!(host, resolved = %chosen, "resolved server address");
    Ok(chosen)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
