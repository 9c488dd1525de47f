//! Search use cases built on [`QuerySession`].
//!
//! - [`collect_all`] broadcasts once and reports every LAN server that
//!   answers within the retry window.
//! - [`find_first`] broadcasts and stops at the first answer.
//! - [`query_address`] queries one known address and waits for its answer.

use std::ops::ControlFlow;

use netquery_core::QueryData;
use serde::Serialize;
use tracing::info;

use super::ports::{Clock, Transport};
use super::query_session::QuerySession;

/// A server that answered, as handed to callers and printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo<A> {
    pub address: A,
    pub ping_ms: u32,
    #[serde(flatten)]
    pub data: QueryData,
}

/// Broadcasts a query and reports every responding server.
///
/// `on_found` runs once per server, synchronously from the poll loop, in the
/// order the answers arrive.  Returns the number of servers found.
pub fn collect_all<T, C, F>(session: &mut QuerySession<T, C>, mut on_found: F) -> usize
where
    T: Transport,
    C: Clock,
    F: FnMut(ServerInfo<T::Addr>),
{
    session.start_broadcast_search();
    session.run_until_done(|addr, data, ping_ms| {
        on_found(ServerInfo {
            address: addr.clone(),
            ping_ms,
            data: data.clone(),
        });
        ControlFlow::Continue(())
    });

    let found = session.count_responded();
    info!(session = %session.id(), found, "LAN search finished");
    session.teardown();
    found
}

/// Broadcasts a query and returns the address of the first server to answer.
///
/// Returns `None` if nobody answered before the broadcast target gave up, or
/// if the search was cancelled first.
pub fn find_first<T, C>(session: &mut QuerySession<T, C>) -> Option<T::Addr>
where
    T: Transport,
    C: Clock,
{
    session.start_broadcast_search();
    session.run_until_done(|_, _, _| ControlFlow::Break(()));

    let registry = session.registry();
    let address = registry
        .first_responder()
        .and_then(|id| registry.get(id))
        .and_then(|target| target.endpoint().address().cloned());
    info!(
        session = %session.id(),
        found = address.is_some(),
        "first-server search finished"
    );
    session.teardown();
    address
}

/// Queries a single known address and waits for its answer.
///
/// Returns `None` once all retries are used up without a reply.
pub fn query_address<T, C>(
    session: &mut QuerySession<T, C>,
    address: T::Addr,
) -> Option<ServerInfo<T::Addr>>
where
    T: Transport,
    C: Clock,
{
    session.reset();
    session.add_server(address.clone());

    let mut answer = None;
    session.run_until_done(|from, data, ping_ms| {
        answer = Some(ServerInfo {
            address: from.clone(),
            ping_ms,
            data: data.clone(),
        });
        ControlFlow::Break(())
    });

    info!(
        session = %session.id(),
        address = ?address,
        responded = answer.is_some(),
        "direct query finished"
    );
    session.teardown();
    answer
}

// ── Tests ─────────────────────────────────────────────────────────────────────
