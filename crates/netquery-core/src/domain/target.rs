//! Discovery targets and the registry that owns them.
//!
//! A *target* is one discovery attempt against one address.  The registry is
//! the session's list of targets, deduplicated by address.
//!
//! # Target lifecycle (for beginners)
//!
//! ```text
//!            send              response
//! Queued ──────────► Queried ─────────────► Responded
//!                     │   ▲
//!                     │   │ retry (attempts += 1)
//!                     └───┘
//!                     │
//!                     │ attempts exhausted and timed out
//!                     ▼
//!                 NoResponse
//! ```
//!
//! - `Queued`: registered, no query sent yet.
//! - `Queried`: at least one query sent, waiting for an answer.
//! - `Responded`: an answer arrived; the payload and ping are stored.
//! - `NoResponse`: every attempt timed out.
//!
//! `Responded` and `NoResponse` are *terminal*: the transition methods on
//! [`Target`] refuse to move a target out of them.
//!
//! # Handles instead of references
//!
//! The registry grows while it is being used: a broadcast answer can add a
//! new target in the middle of a poll tick.  Callers therefore hold a
//! [`TargetId`] (an index plus the registry generation) rather than a
//! reference into the vector.  [`TargetRegistry::release_all`] bumps the
//! generation, so an id from a previous session resolves to `None` instead of
//! silently pointing at a different target.

use std::fmt;

use tracing::debug;

use crate::protocol::messages::QueryData;

/// The address a target queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint<A> {
    /// A specific server address.
    Server(A),
    /// "Everyone on the local network": queries go out as a broadcast.
    Broadcast,
}

impl<A> Endpoint<A> {
    /// Returns the kind of target this endpoint produces.
    pub fn kind(&self) -> TargetKind {
        match self {
            Endpoint::Server(_) => TargetKind::Server,
            Endpoint::Broadcast => TargetKind::Broadcast,
        }
    }

    /// Returns the server address, or `None` for the broadcast endpoint.
    pub fn address(&self) -> Option<&A> {
        match self {
            Endpoint::Server(addr) => Some(addr),
            Endpoint::Broadcast => None,
        }
    }
}

impl<A: fmt::Display> fmt::Display for Endpoint<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Server(addr) => write!(f, "{addr}"),
            Endpoint::Broadcast => f.write_str("<broadcast>"),
        }
    }
}

/// Whether a target is a normal server or the broadcast pseudo-target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Server,
    Broadcast,
}

/// Where a target is in the query lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Query not yet sent.
    Queued,
    /// Query sent, waiting for a response.
    Queried,
    /// Response received.
    Responded,
    /// Every attempt timed out.
    NoResponse,
}

impl TargetState {
    /// Returns `true` for `Responded` and `NoResponse`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TargetState::Responded | TargetState::NoResponse)
    }
}

/// Stable handle to a target inside a [`TargetRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId {
    index: usize,
    generation: u64,
}

/// One discovery attempt against one endpoint.
#[derive(Debug, Clone)]
pub struct Target<A> {
    endpoint: Endpoint<A>,
    state: TargetState,
    attempts: u32,
    last_query_ms: u64,
    ping_ms: Option<u32>,
    response: Option<QueryData>,
    reported: bool,
}

impl<A> Target<A> {
    fn new(endpoint: Endpoint<A>) -> Self {
        Self {
            endpoint,
            state: TargetState::Queued,
            attempts: 0,
            last_query_ms: 0,
            ping_ms: None,
            response: None,
            reported: false,
        }
    }

    pub fn endpoint(&self) -> &Endpoint<A> {
        &self.endpoint
    }

    pub fn kind(&self) -> TargetKind {
        self.endpoint.kind()
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Number of queries sent to this target so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Timestamp (ms) of the most recent query sent to this target.
    pub fn last_query_ms(&self) -> u64 {
        self.last_query_ms
    }

    /// Round-trip time; `Some` only once the target has responded.
    pub fn ping_ms(&self) -> Option<u32> {
        self.ping_ms
    }

    /// Decoded payload; `Some` only once the target has responded.
    pub fn response(&self) -> Option<&QueryData> {
        self.response.as_ref()
    }

    /// Whether the response has been surfaced to the caller.
    pub fn reported(&self) -> bool {
        self.reported
    }

    /// Returns `true` if the most recent query is older than `timeout_ms`.
    pub fn query_timed_out(&self, now_ms: u64, timeout_ms: u64) -> bool {
        self.state == TargetState::Queried && now_ms.saturating_sub(self.last_query_ms) > timeout_ms
    }

    /// Records a query sent at `now_ms`.
    ///
    /// Returns `false` (and changes nothing) if the target is terminal.
    pub fn mark_queried(&mut self, now_ms: u64) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = TargetState::Queried;
        self.last_query_ms = now_ms;
        self.attempts += 1;
        true
    }

    /// Moves a freshly promoted target to `Queried` as if it had been sent the
    /// broadcast query at `broadcast_sent_ms`.
    ///
    /// The attempt counter is left untouched: no query was sent to this
    /// address individually.  Returns `false` unless the target is `Queued`.
    pub fn adopt_broadcast_query(&mut self, broadcast_sent_ms: u64) -> bool {
        if self.state != TargetState::Queued {
            return false;
        }
        self.state = TargetState::Queried;
        self.last_query_ms = broadcast_sent_ms;
        true
    }

    /// Stores a response received at `now_ms` and returns the computed ping.
    ///
    /// Only a `Queried` target accepts a response, so this returns `Some` at
    /// most once over the target's lifetime.
    pub fn record_response(&mut self, data: QueryData, now_ms: u64) -> Option<u32> {
        if self.state != TargetState::Queried {
            return None;
        }
        let ping = u32::try_from(now_ms.saturating_sub(self.last_query_ms)).unwrap_or(u32::MAX);
        self.state = TargetState::Responded;
        self.response = Some(data);
        self.ping_ms = Some(ping);
        self.reported = true;
        Some(ping)
    }

    /// Gives up on the target.  Returns `false` unless it was `Queried`.
    pub fn mark_no_response(&mut self) -> bool {
        if self.state != TargetState::Queried {
            return false;
        }
        self.state = TargetState::NoResponse;
        true
    }
}

/// The session's set of targets, deduplicated by endpoint.
///
/// Targets are kept in registration order; the scheduler relies on that order
/// to decide who is queried next.
#[derive(Debug)]
pub struct TargetRegistry<A> {
    targets: Vec<Target<A>>,
    generation: u64,
}

impl<A> Default for TargetRegistry<A> {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            generation: 0,
        }
    }
}

impl<A: Clone + Eq + fmt::Debug> TargetRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the target for `endpoint`, optionally registering it.
    ///
    /// - Found: returns the existing id regardless of `create`.
    /// - Absent and `create == false`: returns `None`.
    /// - Absent and `create == true`: appends a new `Queued` target.
    ///
    /// Growth uses the global allocator; an allocation failure aborts the
    /// process.
    pub fn find_or_create(&mut self, endpoint: &Endpoint<A>, create: bool) -> Option<TargetId> {
        match self.find(endpoint) {
            Some(id) => Some(id),
            None if create => Some(self.append(endpoint.clone())),
            None => None,
        }
    }

    /// Registers `endpoint` if needed and returns its id.
    pub fn register(&mut self, endpoint: Endpoint<A>) -> TargetId {
        match self.find(&endpoint) {
            Some(id) => id,
            None => self.append(endpoint),
        }
    }

    /// Looks up the target for `endpoint` without creating one.
    pub fn find(&self, endpoint: &Endpoint<A>) -> Option<TargetId> {
        self.targets
            .iter()
            .position(|t| &t.endpoint == endpoint)
            .map(|index| self.id_at(index))
    }

    /// Resolves `id`; `None` if it belongs to a released session.
    pub fn get(&self, id: TargetId) -> Option<&Target<A>> {
        if id.generation != self.generation {
            return None;
        }
        self.targets.get(id.index)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut Target<A>> {
        if id.generation != self.generation {
            return None;
        }
        self.targets.get_mut(id.index)
    }

    /// Iterates over targets in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Target<A>)> {
        let generation = self.generation;
        self.targets
            .iter()
            .enumerate()
            .map(move |(index, t)| (TargetId { index, generation }, t))
    }

    /// Mutably iterates over targets in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Target<A>> {
        self.targets.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Drops every target (and the addresses they hold) and invalidates all
    /// outstanding ids.
    pub fn release_all(&mut self) {
        if !self.targets.is_empty() {
            debug!(count = self.targets.len(), "releasing discovery targets");
        }
        self.targets.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Number of server targets that have responded.
    ///
    /// The broadcast pseudo-target is never counted.
    pub fn count_responded(&self) -> usize {
        self.targets
            .iter()
            .filter(|t| t.kind() == TargetKind::Server && t.state == TargetState::Responded)
            .count()
    }

    /// Returns `true` when every target, broadcast included, is terminal.
    pub fn all_terminal(&self) -> bool {
        self.targets.iter().all(|t| t.state.is_terminal())
    }

    /// First server target to have responded, in registration order.
    pub fn first_responder(&self) -> Option<TargetId> {
        self.targets
            .iter()
            .position(|t| t.kind() == TargetKind::Server && t.state == TargetState::Responded)
            .map(|index| self.id_at(index))
    }

    /// Appends a new `Queued` target.  Callers check for an existing one.
    fn append(&mut self, endpoint: Endpoint<A>) -> TargetId {
        let index = self.targets.len();
        debug!(?endpoint, index, "registered discovery target");
        self.targets.push(Target::new(endpoint));
        self.id_at(index)
    }

    fn id_at(&self, index: usize) -> TargetId {
        TargetId {
            index,
            generation: self.generation,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
