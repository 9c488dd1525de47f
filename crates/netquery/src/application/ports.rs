//! Abstractions the query engine depends on.
//!
//! The production implementations live in `infrastructure` (a non-blocking
//! UDP socket and the monotonic system clock).  Tests use
//! [`crate::infrastructure::network::memory::MemoryTransport`] and
//! [`crate::infrastructure::clock::ManualClock`], or a `mockall` mock of
//! [`Transport`] for interaction checks.

use std::fmt;
use std::io;
use std::time::Duration;

/// Datagram transport used by the query engine.
///
/// All methods must return promptly: the engine is driven from a cooperative
/// poll loop and a blocking call would stall every target's timers.
#[cfg_attr(test, mockall::automock(type Addr = std::net::SocketAddr;))]
pub trait Transport {
    /// Address handle for a peer.  Equality is address identity: the registry
    /// deduplicates targets with it.
    type Addr: Clone + Eq + fmt::Debug;

    /// Sends `packet` to one specific peer.
    fn send_to(&mut self, addr: &Self::Addr, packet: &[u8]) -> io::Result<()>;

    /// Sends `packet` to every peer on the local network.
    fn send_broadcast(&mut self, packet: &[u8]) -> io::Result<()>;

    /// Returns the next pending datagram and its sender, or `Ok(None)` if
    /// nothing is waiting.  Never blocks.
    fn try_recv(&mut self) -> io::Result<Option<(Self::Addr, Vec<u8>)>>;
}

/// Millisecond time source for the engine.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.  Must never go backwards.
    fn now_ms(&self) -> u64;

    /// Yields between poll ticks.
    ///
    /// The system clock puts the thread to sleep; a manual clock simply
    /// advances its time, which makes the blocking loop deterministic in
    /// tests.
    fn sleep(&self, duration: Duration);
}
