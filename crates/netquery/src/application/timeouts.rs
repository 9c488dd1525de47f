//! Timeout manager: gives up on targets that never answered.
//!
//! A target is declared unresponsive once it has been sent
//! [`MAX_QUERY_ATTEMPTS`] queries and the last one is older than
//! [`QUERY_TIMEOUT_MS`].  A target that timed out with attempts to spare stays
//! `Queried`; the scheduler picks it up again for a retry.

use std::fmt;

use netquery_core::{TargetRegistry, TargetState};
use tracing::debug;

use super::scheduler::{MAX_QUERY_ATTEMPTS, QUERY_TIMEOUT_MS};

/// Moves every exhausted target to `NoResponse`.  Returns how many moved.
pub fn expire_targets<A>(registry: &mut TargetRegistry<A>, now_ms: u64) -> usize
where
    A: Clone + Eq + fmt::Debug,
{
    let mut expired = 0;
    for target in registry.iter_mut() {
        if target.state() == TargetState::Queried
            && target.attempts() >= MAX_QUERY_ATTEMPTS
            && target.query_timed_out(now_ms, QUERY_TIMEOUT_MS)
            && target.mark_no_response()
        {
            debug!(
                endpoint = ?target.endpoint(),
                attempts = target.attempts(),
                "no response, giving up"
            );
            expired += 1;
        }
    }
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use netquery_core::Endpoint;

    fn target_with_attempts(registry: &mut TargetRegistry<&'static str>, sends: &[u64]) {
        let id = registry.register(Endpoint::Server("S"));
        for &at in sends {
            registry.get_mut(id).unwrap().mark_queried(at);
        }
    }

    #[test]
    fn test_target_with_attempts_left_stays_queried() {
        let mut registry = TargetRegistry::new();
        target_with_attempts(&mut registry, &[0, 2001]);

        assert_eq!(expire_targets(&mut registry, 10_000), 0);
        assert_eq!(registry.iter().next().unwrap().1.state(), TargetState::Queried);
    }

    #[test]
    fn test_exhausted_target_expires_only_after_timeout() {
        // Arrange: third send at t=4002
        let mut registry = TargetRegistry::new();
        target_with_attempts(&mut registry, &[0, 2001, 4002]);

        // Act / Assert
        assert_eq!(expire_targets(&mut registry, 6002), 0, "exactly 2000ms is not a timeout");
        assert_eq!(expire_targets(&mut registry, 6003), 1);
        assert_eq!(registry.iter().next().unwrap().1.state(), TargetState::NoResponse);
    }

    #[test]
    fn test_queued_and_under_budget_targets_are_untouched() {
        let mut registry: TargetRegistry<&'static str> = TargetRegistry::new();
        registry.register(Endpoint::Server("queued"));
        let done = registry.register(Endpoint::Server("done"));
        registry.get_mut(done).unwrap().mark_queried(0);

        assert_eq!(expire_targets(&mut registry, 100_000), 0);
        assert_eq!(registry.get(done).unwrap().state(), TargetState::Queried);
    }

    #[test]
    fn test_expire_is_idempotent() {
        let mut registry = TargetRegistry::new();
        target_with_attempts(&mut registry, &[0, 2001, 4002]);
        assert_eq!(expire_targets(&mut registry, 7000), 1);
        assert_eq!(expire_targets(&mut registry, 8000), 0);
    }
}
