//! Query scheduler: picks at most one target per tick and sends it a query.
//!
//! # Rate limiting
//!
//! A LAN search can grow to dozens of targets within a second (every server
//! that answers the broadcast becomes one).  Sending to all of them at once
//! would burst the local socket buffer, so the scheduler enforces a single
//! session-wide gap of [`MIN_SEND_INTERVAL_MS`] between sends, regardless of
//! which target they go to.
//!
//! # Target selection
//!
//! Targets are scanned in registration order.  The first one that is either
//! still `Queued`, or `Queried` with its last query older than
//! [`QUERY_TIMEOUT_MS`], gets the query.  Targets that have used up their
//! attempts are moved out of `Queried` by the timeout manager before the
//! scheduler runs, so they are never picked again.

use netquery_core::{encode_packet, Endpoint, Packet, TargetId, TargetRegistry, TargetState};
use tracing::{debug, warn};

use super::ports::Transport;

/// Minimum gap between two sends anywhere in the session.
pub const MIN_SEND_INTERVAL_MS: u64 = 50;

/// Time to wait for an answer before a query counts as lost.
pub const QUERY_TIMEOUT_MS: u64 = 2000;

/// Queries sent to a target before it is declared unresponsive.
pub const MAX_QUERY_ATTEMPTS: u32 = 3;

/// Per-session scheduling state: the time of the last send.
#[derive(Debug, Default)]
pub struct QueryScheduler {
    last_send_ms: Option<u64>,
}

impl QueryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the last send time, so the next session may send immediately.
    pub fn reset(&mut self) {
        self.last_send_ms = None;
    }

    /// Time of the most recent send in this session.
    pub fn last_send_ms(&self) -> Option<u64> {
        self.last_send_ms
    }

    /// Runs one scheduling step at `now_ms`.
    ///
    /// Returns the id of the target that was queried, or `None` if the rate
    /// limit is still in force or no target is due.  A transport error is
    /// logged and otherwise ignored: the target is still marked as queried and
    /// the retry policy covers the lost packet.
    pub fn tick<T: Transport>(
        &mut self,
        registry: &mut TargetRegistry<T::Addr>,
        transport: &mut T,
        now_ms: u64,
    ) -> Option<TargetId> {
        if let Some(last) = self.last_send_ms {
            if now_ms.saturating_sub(last) < MIN_SEND_INTERVAL_MS {
                return None;
            }
        }

        let id = registry
            .iter()
            .find(|(_, t)| {
                t.state() == TargetState::Queued || t.query_timed_out(now_ms, QUERY_TIMEOUT_MS)
            })
            .map(|(id, _)| id)?;

        let target = registry.get_mut(id)?;
        let packet = encode_packet(&Packet::Query);
        let result = match target.endpoint() {
            Endpoint::Server(addr) => transport.send_to(addr, &packet),
            Endpoint::Broadcast => transport.send_broadcast(&packet),
        };
        if let Err(e) = result {
            warn!(endpoint = ?target.endpoint(), "failed to send query: {e}");
        }

        target.mark_queried(now_ms);
        debug!(
            endpoint = ?target.endpoint(),
            attempt = target.attempts(),
            "sent query"
        );

        self.last_send_ms = Some(now_ms);
        Some(id)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io;
    use std::net::SocketAddr;

    use super::*;
    use crate::application::ports::MockTransport;
    use crate::infrastructure::network::memory::MemoryTransport;

    fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, last], 2342))
    }

    const QUERY_BYTES: [u8; 2] = [0x00, 13];

    #[test]
    fn test_first_tick_sends_to_first_queued_target() {
        // Arrange
        let mut registry = TargetRegistry::new();
        let a = registry.register(Endpoint::Server(addr(1)));
        registry.register(Endpoint::Server(addr(2)));
        let mut transport = MockTransport::new();
        transport
            .expect_send_to()
            .withf(|to, packet| *to == addr(1) && packet == &QUERY_BYTES[..])
            .times(1)
            .returning(|_, _| Ok(()));
        let mut scheduler = QueryScheduler::new();

        // Act
        let sent = scheduler.tick(&mut registry, &mut transport, 0);

        // Assert
        assert_eq!(sent, Some(a));
        let target = registry.get(a).unwrap();
        assert_eq!(target.state(), TargetState::Queried);
        assert_eq!(target.attempts(), 1);
        assert_eq!(target.last_query_ms(), 0);
        assert_eq!(scheduler.last_send_ms(), Some(0));
    }

    #[test]
    fn test_broadcast_target_uses_broadcast_send() {
        // Arrange
        let mut registry = TargetRegistry::new();
        registry.register(Endpoint::Broadcast);
        let mut transport = MockTransport::new();
        transport
            .expect_send_broadcast()
            .withf(|packet| packet == &QUERY_BYTES[..])
            .times(1)
            .returning(|_| Ok(()));
        transport.expect_send_to().never();

        // Act
        let sent = QueryScheduler::new().tick(&mut registry, &mut transport, 10);

        // Assert
        assert!(sent.is_some());
    }

    #[test]
    fn test_send_error_still_marks_target_queried() {
        // Arrange
        let mut registry = TargetRegistry::new();
        let a = registry.register(Endpoint::Server(addr(1)));
        let mut transport = MockTransport::new();
        transport
            .expect_send_to()
            .times(1)
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::Other, "network unreachable")));

        // Act
        QueryScheduler::new().tick(&mut registry, &mut transport, 0);

        // Assert
        assert_eq!(registry.get(a).unwrap().state(), TargetState::Queried);
        assert_eq!(registry.get(a).unwrap().attempts(), 1);
    }

    #[test]
    fn test_rate_limit_blocks_sends_within_interval() {
        // Arrange
        let mut registry = TargetRegistry::new();
        registry.register(Endpoint::Server(addr(1)));
        let b = registry.register(Endpoint::Server(addr(2)));
        let mut transport = MemoryTransport::new();
        let mut scheduler = QueryScheduler::new();
        scheduler.tick(&mut registry, &mut transport, 1000);

        // Act / Assert
        assert_eq!(scheduler.tick(&mut registry, &mut transport, 1001), None);
        assert_eq!(scheduler.tick(&mut registry, &mut transport, 1049), None);
        assert_eq!(scheduler.tick(&mut registry, &mut transport, 1050), Some(b));
        assert_eq!(transport.sent_count(), 2);
    }

    #[test]
    fn test_only_one_send_per_tick() {
        let mut registry = TargetRegistry::new();
        for i in 1..=5 {
            registry.register(Endpoint::Server(addr(i)));
        }
        let mut transport = MemoryTransport::new();
        let mut scheduler = QueryScheduler::new();

        scheduler.tick(&mut registry, &mut transport, 0);

        assert_eq!(transport.sent_count(), 1);
        let queued = registry
            .iter()
            .filter(|(_, t)| t.state() == TargetState::Queued)
            .count();
        assert_eq!(queued, 4);
    }

    #[test]
    fn test_queried_target_is_not_retried_before_timeout() {
        let mut registry = TargetRegistry::new();
        let a = registry.register(Endpoint::Server(addr(1)));
        let mut transport = MemoryTransport::new();
        let mut scheduler = QueryScheduler::new();
        scheduler.tick(&mut registry, &mut transport, 0);

        assert_eq!(scheduler.tick(&mut registry, &mut transport, 2000), None);
        assert_eq!(scheduler.tick(&mut registry, &mut transport, 2001), Some(a));
        assert_eq!(registry.get(a).unwrap().attempts(), 2);
        assert_eq!(registry.get(a).unwrap().last_query_ms(), 2001);
    }

    #[test]
    fn test_terminal_targets_are_skipped() {
        // Arrange
        let mut registry = TargetRegistry::new();
        let a = registry.register(Endpoint::Server(addr(1)));
        let b = registry.register(Endpoint::Server(addr(2)));
        registry.get_mut(a).unwrap().mark_queried(0);
        registry.get_mut(a).unwrap().mark_no_response();
        let mut transport = MemoryTransport::new();

        // Act
        let sent = QueryScheduler::new().tick(&mut registry, &mut transport, 5000);

        // Assert
        assert_eq!(sent, Some(b));
    }

    #[test]
    fn test_reset_allows_immediate_send() {
        let mut registry = TargetRegistry::new();
        registry.register(Endpoint::Server(addr(1)));
        registry.register(Endpoint::Server(addr(2)));
        let mut transport = MemoryTransport::new();
        let mut scheduler = QueryScheduler::new();
        scheduler.tick(&mut registry, &mut transport, 100);

        scheduler.reset();

        assert!(scheduler.tick(&mut registry, &mut transport, 101).is_some());
    }
}
