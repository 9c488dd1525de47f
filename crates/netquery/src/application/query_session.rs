//! Session driver: one discovery run over a transport and a clock.
//!
//! A [`QuerySession`] owns everything a discovery run needs: the target
//! registry, the scheduler's rate-limit clock, the early-exit flag, and the
//! injected [`Transport`] and [`Clock`].  There is no global state; two
//! sessions over two sockets can run side by side.
//!
//! # Poll tick (for beginners)
//!
//! [`QuerySession::poll`] performs one non-blocking step:
//!
//! ```text
//! expire exhausted targets  →  send at most one query  →  handle at most one datagram
//! ```
//!
//! and reports whether any target is still waiting.  Callers that own an
//! event loop call `poll` themselves; everyone else uses
//! [`QuerySession::run_until_done`], which polls with a 1 ms yield in between
//! until every target is terminal or an early exit was requested.
//!
//! # Cancellation
//!
//! Cancellation is cooperative.  The result callback can return
//! `ControlFlow::Break(())`, and any thread holding a [`CancelHandle`] can call
//! [`CancelHandle::cancel`].  Either way the flag is only checked at the top
//! of the next tick, so a tick is never interrupted half-way.

use std::ops::ControlFlow;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use netquery_core::{Endpoint, QueryData, TargetId, TargetRegistry};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ports::{Clock, Transport};
use super::responses::{handle_datagram, ResponseOutcome};
use super::scheduler::QueryScheduler;
use super::timeouts::expire_targets;

/// Pause between two ticks of [`QuerySession::run_until_done`].
pub const TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Thread-safe handle that requests an early exit from a running session.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Asks the session to stop at the top of its next tick.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// State for one discovery run.
pub struct QuerySession<T: Transport, C: Clock> {
    id: Uuid,
    transport: T,
    clock: C,
    registry: TargetRegistry<T::Addr>,
    scheduler: QueryScheduler,
    exit_requested: Arc<AtomicBool>,
}

impl<T: Transport, C: Clock> QuerySession<T, C> {
    /// Creates an empty session over `transport` and `clock`.
    pub fn new(transport: T, clock: C) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            clock,
            registry: TargetRegistry::new(),
            scheduler: QueryScheduler::new(),
            exit_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Identifier of the current run, used as a log field.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn registry(&self) -> &TargetRegistry<T::Addr> {
        &self.registry
    }

    /// Starts a fresh run: releases all targets and clears the rate-limit
    /// clock.  A pending early-exit request survives, so a cancel raised
    /// before the run starts still stops it.
    pub fn reset(&mut self) {
        self.registry.release_all();
        self.scheduler.reset();
        self.id = Uuid::new_v4();
        debug!(session = %self.id, "query session reset");
    }

    /// Releases every target once the caller has consumed the results and
    /// clears the early-exit flag for the next run.
    pub fn teardown(&mut self) {
        self.registry.release_all();
        self.exit_requested.store(false, Ordering::Relaxed);
        debug!(session = %self.id, "query session torn down");
    }

    /// Resets the session and registers the single broadcast target.
    pub fn start_broadcast_search(&mut self) -> TargetId {
        self.reset();
        self.registry.register(Endpoint::Broadcast)
    }

    /// Registers a server address to query in the current run.
    ///
    /// Registering the same address twice returns the existing target.
    pub fn add_server(&mut self, addr: T::Addr) -> TargetId {
        self.registry.register(Endpoint::Server(addr))
    }

    /// Returns a handle other threads can use to stop the run.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.exit_requested),
        }
    }

    /// Requests an early exit from [`run_until_done`](Self::run_until_done).
    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::Relaxed);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Relaxed)
    }

    /// Number of server targets that have responded in this run.
    pub fn count_responded(&self) -> usize {
        self.registry.count_responded()
    }

    /// Runs one non-blocking tick.  Returns `true` while any target is still
    /// waiting for an answer or a retry.
    ///
    /// `on_response` runs synchronously from inside this call, at most once
    /// per responding target.  Returning `ControlFlow::Break(())` from it
    /// requests an early exit.
    pub fn poll<F>(&mut self, mut on_response: F) -> bool
    where
        F: FnMut(&T::Addr, &QueryData, u32) -> ControlFlow<()>,
    {
        self.poll_with(&mut on_response)
    }

    /// Polls until every target is terminal or an early exit is requested,
    /// yielding [`TICK_INTERVAL`] through the clock between ticks.
    pub fn run_until_done<F>(&mut self, mut on_response: F)
    where
        F: FnMut(&T::Addr, &QueryData, u32) -> ControlFlow<()>,
    {
        info!(session = %self.id, targets = self.registry.len(), "query loop started");

        while !self.exit_requested() && self.poll_with(&mut on_response) {
            self.clock.sleep(TICK_INTERVAL);
        }

        info!(
            session = %self.id,
            responded = self.registry.count_responded(),
            cancelled = self.exit_requested(),
            "query loop finished"
        );
    }

    fn poll_with<F>(&mut self, on_response: &mut F) -> bool
    where
        F: FnMut(&T::Addr, &QueryData, u32) -> ControlFlow<()>,
    {
        let now_ms = self.clock.now_ms();

        expire_targets(&mut self.registry, now_ms);
        self.scheduler
            .tick(&mut self.registry, &mut self.transport, now_ms);

        match self.transport.try_recv() {
            Ok(Some((from, bytes))) => {
                let outcome =
                    handle_datagram(&mut self.registry, &from, &bytes, now_ms, on_response);
                if let ResponseOutcome::Reported {
                    flow: ControlFlow::Break(()),
                    ..
                } = outcome
                {
                    self.request_exit();
                }
            }
            Ok(None) => {}
            Err(e) => warn!(session = %self.id, "receive failed: {e}"),
        }

        !self.registry.all_terminal()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use netquery_core::{encode_packet, GameMission, GameMode, Packet, TargetState};

    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::network::memory::MemoryTransport;

    fn addr(last: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last], 2342))
    }

    fn data(description: &str) -> QueryData {
        QueryData {
            version: "test".to_string(),
            server_running: false,
            num_players: 1,
            max_players: 8,
            game_mode: GameMode::Commercial,
            game_mission: GameMission::Doom2,
            description: description.to_string(),
        }
    }

    fn session() -> (
        QuerySession<MemoryTransport<SocketAddr>, ManualClock>,
        MemoryTransport<SocketAddr>,
        ManualClock,
    ) {
        let transport = MemoryTransport::new();
        let clock = ManualClock::new();
        (
            QuerySession::new(transport.clone(), clock.clone()),
            transport,
            clock,
        )
    }

    fn ignore(_: &SocketAddr, _: &QueryData, _: u32) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    #[test]
    fn test_empty_session_poll_reports_done() {
        let (mut session, _, _) = session();
        assert!(!session.poll(ignore));
    }

    #[test]
    fn test_poll_sends_then_receives_in_one_tick() {
        // Arrange: the answer is already waiting when the tick runs
        let (mut session, transport, clock) = session();
        let id = session.add_server(addr(1));
        clock.set(1000);
        transport.push_inbound(addr(1), encode_packet(&Packet::QueryResponse(data("x"))));

        // Act
        let pending = session.poll(ignore);

        // Assert
        assert!(!pending);
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(session.registry().get(id).unwrap().ping_ms(), Some(0));
    }

    #[test]
    fn test_callback_break_requests_exit() {
        let (mut session, transport, _) = session();
        session.add_server(addr(1));
        session.add_server(addr(2));
        transport.push_inbound(addr(1), encode_packet(&Packet::QueryResponse(data("x"))));

        let pending = session.poll(|_: &SocketAddr, _: &QueryData, _: u32| ControlFlow::Break(()));

        assert!(pending, "second target is still queued");
        assert!(session.exit_requested());
    }

    #[test]
    fn test_run_until_done_stops_immediately_when_cancelled() {
        // Arrange
        let (mut session, transport, _) = session();
        session.add_server(addr(1));
        session.cancel_handle().cancel();

        // Act
        session.run_until_done(ignore);

        // Assert: the flag is checked before the first tick
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_run_until_done_times_out_silent_server() {
        // Arrange
        let (mut session, transport, clock) = session();
        let id = session.add_server(addr(1));

        // Act
        session.run_until_done(ignore);

        // Assert
        let target = session.registry().get(id).unwrap();
        assert_eq!(target.state(), TargetState::NoResponse);
        assert_eq!(target.attempts(), 3);
        assert_eq!(transport.sent_count(), 3);
        assert!(clock.now_ms() > target.last_query_ms() + 2000);
    }

    #[test]
    fn test_reset_releases_targets_but_keeps_exit_request() {
        let (mut session, _, _) = session();
        let old = session.add_server(addr(1));
        let first_id = session.id();
        session.request_exit();

        session.reset();

        assert!(session.registry().is_empty());
        assert!(session.registry().get(old).is_none());
        assert!(session.exit_requested(), "cancel raised before the run must survive");
        assert_ne!(session.id(), first_id);
    }

    #[test]
    fn test_teardown_clears_exit_request() {
        let (mut session, _, _) = session();
        session.add_server(addr(1));
        session.request_exit();

        session.teardown();

        assert!(session.registry().is_empty());
        assert!(!session.exit_requested());
    }

    #[test]
    fn test_start_broadcast_search_registers_one_broadcast_target() {
        let (mut session, _, _) = session();
        session.add_server(addr(1));

        let id = session.start_broadcast_search();

        assert_eq!(session.registry().len(), 1);
        assert_eq!(
            session.registry().get(id).unwrap().endpoint(),
            &Endpoint::Broadcast
        );
    }

    #[test]
    fn test_receive_error_is_not_fatal() {
        let (mut session, transport, _) = session();
        session.add_server(addr(1));
        transport.fail_next_recv();

        assert!(session.poll(ignore));
        assert_eq!(transport.sent_count(), 1);
    }
}
