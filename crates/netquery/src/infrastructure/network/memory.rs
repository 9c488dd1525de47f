//! In-memory transport for tests and benchmarks.
//!
//! [`MemoryTransport`] records every packet the engine sends and hands back
//! datagrams from an inbound queue.  It can also play the part of the LAN:
//!
//! - [`MemoryTransport::with_lan_servers`] answers every broadcast (and every
//!   direct query to one of the listed addresses) with that server's payload.
//! - [`MemoryTransport::respond_to`] answers direct queries to one address
//!   after a delay, measured on an attached [`ManualClock`].
//!
//! Clones share the same state, so a test keeps one handle for assertions
//! while the session owns the other.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use netquery_core::{encode_packet, Endpoint, Packet, QueryData};

use super::super::clock::ManualClock;
use crate::application::ports::{Clock, Transport};

/// One packet the engine handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket<A> {
    pub to: Endpoint<A>,
    pub bytes: Vec<u8>,
    /// Clock reading at send time, or 0 without an attached clock.
    pub at_ms: u64,
}

#[derive(Debug)]
struct Inbound<A> {
    from: A,
    bytes: Vec<u8>,
    deliver_at_ms: u64,
}

#[derive(Debug)]
struct DelayedResponder<A> {
    addr: A,
    data: QueryData,
    delay_ms: u64,
}

#[derive(Debug)]
struct Inner<A> {
    sent: Vec<SentPacket<A>>,
    inbound: VecDeque<Inbound<A>>,
    lan_servers: Vec<(A, QueryData)>,
    responders: Vec<DelayedResponder<A>>,
    fail_next_recv: bool,
}

/// Shared in-memory [`Transport`].
#[derive(Debug)]
pub struct MemoryTransport<A> {
    inner: Arc<Mutex<Inner<A>>>,
    clock: Option<ManualClock>,
}

impl<A> Clone for MemoryTransport<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: self.clock.clone(),
        }
    }
}

impl<A: Clone + Eq + fmt::Debug> Default for MemoryTransport<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Clone + Eq + fmt::Debug> MemoryTransport<A> {
    /// Creates a transport with nothing queued and no simulated servers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sent: Vec::new(),
                inbound: VecDeque::new(),
                lan_servers: Vec::new(),
                responders: Vec::new(),
                fail_next_recv: false,
            })),
            clock: None,
        }
    }

    /// Creates a transport whose LAN holds `servers`; each one answers every
    /// broadcast and every direct query with its payload, without delay.
    pub fn with_lan_servers(servers: Vec<(A, QueryData)>) -> Self {
        let transport = Self::new();
        transport.lock().lan_servers = servers;
        transport
    }

    /// Attaches a clock used for send timestamps and delayed delivery.
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Makes `addr` answer direct queries with `data`, `delay_ms` after each
    /// query is sent.  Delays need an attached clock to mean anything.
    pub fn respond_to(&self, addr: A, data: QueryData, delay_ms: u64) {
        self.lock().responders.push(DelayedResponder {
            addr,
            data,
            delay_ms,
        });
    }

    /// Queues a raw datagram for immediate delivery.
    pub fn push_inbound(&self, from: A, bytes: Vec<u8>) {
        self.lock().inbound.push_back(Inbound {
            from,
            bytes,
            deliver_at_ms: 0,
        });
    }

    /// Queues a well-formed QUERY_RESPONSE for immediate delivery.
    pub fn push_response(&self, from: A, data: QueryData) {
        self.push_inbound(from, encode_packet(&Packet::QueryResponse(data)));
    }

    /// Makes the next `try_recv` fail with an I/O error.
    pub fn fail_next_recv(&self) {
        self.lock().fail_next_recv = true;
    }

    /// Every packet sent so far, in order.
    pub fn sent(&self) -> Vec<SentPacket<A>> {
        self.lock().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Datagrams still waiting to be received, ready or not.
    pub fn pending_inbound(&self) -> usize {
        self.lock().inbound.len()
    }

    fn now_ms(&self) -> u64 {
        self.clock.as_ref().map_or(0, |c| c.now_ms())
    }

    fn lock(&self) -> MutexGuard<'_, Inner<A>> {
        self.inner.lock().expect("lock poisoned")
    }

    fn record(&self, to: Endpoint<A>, packet: &[u8]) -> MutexGuard<'_, Inner<A>> {
        let at_ms = self.now_ms();
        let mut inner = self.lock();
        inner.sent.push(SentPacket {
            to,
            bytes: packet.to_vec(),
            at_ms,
        });
        inner
    }
}

impl<A: Clone + Eq + fmt::Debug> Transport for MemoryTransport<A> {
    type Addr = A;

    fn send_to(&mut self, addr: &A, packet: &[u8]) -> io::Result<()> {
        let now = self.now_ms();
        let mut inner = self.record(Endpoint::Server(addr.clone()), packet);

        let mut replies: Vec<Inbound<A>> = inner
            .lan_servers
            .iter()
            .filter(|(server, _)| server == addr)
            .map(|(server, data)| reply(server, data, now))
            .collect();
        replies.extend(
            inner
                .responders
                .iter()
                .filter(|r| &r.addr == addr)
                .map(|r| reply(&r.addr, &r.data, now.saturating_add(r.delay_ms))),
        );
        inner.inbound.extend(replies);
        Ok(())
    }

    fn send_broadcast(&mut self, packet: &[u8]) -> io::Result<()> {
        let now = self.now_ms();
        let mut inner = self.record(Endpoint::Broadcast, packet);

        let replies: Vec<Inbound<A>> = inner
            .lan_servers
            .iter()
            .map(|(server, data)| reply(server, data, now))
            .collect();
        inner.inbound.extend(replies);
        Ok(())
    }

    fn try_recv(&mut self) -> io::Result<Option<(A, Vec<u8>)>> {
        // Without a clock every queued datagram is ready.
        let now = self.clock.as_ref().map_or(u64::MAX, |c| c.now_ms());
        let mut inner = self.lock();

        if std::mem::take(&mut inner.fail_next_recv) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated receive failure"));
        }

        let ready = inner.inbound.iter().position(|d| d.deliver_at_ms <= now);
        Ok(ready
            .and_then(|index| inner.inbound.remove(index))
            .map(|d| (d.from, d.bytes)))
    }
}

fn reply<A: Clone>(from: &A, data: &QueryData, deliver_at_ms: u64) -> Inbound<A> {
    Inbound {
        from: from.clone(),
        bytes: encode_packet(&Packet::QueryResponse(data.clone())),
        deliver_at_ms,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
