//! Single-flight refresh state and circuit breaker
//!
//! [`RenewalCoordinator`] is the process-wide state behind reactive token
//! renewal. It answers one question for a request that just received a 401:
//! start a refresh, wait for the one already in flight, or give up because
//! too many refreshes failed in a row.
//!
//! The state lives behind a `parking_lot::Mutex` that is never held across an
//! `.await`. The refreshing flag is mirrored into a `watch` channel so a
//! waiter subscribing after the flag was cleared still observes it.
//!
//! # Breaker policy
//!
//! Every failed refresh increments `failure_count`; a successful one resets
//! it. Once the count reaches `max_failures` the breaker is open and stays
//! open until [`RenewalCoordinator::reset`], which the session layer calls on
//! the next successful login or registration. The count never exceeds
//! `max_failures`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Consecutive refresh failures tolerated before the breaker opens
pub const DEFAULT_MAX_FAILURES: u32 = 3;

/// How long a request waits for someone else's refresh to resolve
pub const DEFAULT_WAIT_CEILING: Duration = Duration::from_millis(2000);

/// What a request that saw a 401 should do next
#[derive(Debug)]
pub enum RefreshDecision {
    /// Caller is the refresher; holds the flag until the permit is dropped
    Start(RefreshPermit),
    /// A refresh is already in flight
    Wait,
    /// Too many consecutive failures; no refresh may be attempted
    CircuitOpen,
}

/// Breaker state after recording a refresh outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    /// Further refreshes are allowed
    Closed,
    /// This failure opened the breaker (or it was already open)
    Tripped,
}

#[derive(Debug, Default)]
struct State {
    is_refreshing: bool,
    failure_count: u32,
}

#[derive(Debug)]
struct Inner {
    max_failures: u32,
    state: Mutex<State>,
    refreshing: watch::Sender<bool>,
}

impl Inner {
    fn set_refreshing(&self, refreshing: bool) {
        let mut state = self.state.lock();
        state.is_refreshing = refreshing;
        self.refreshing.send_replace(refreshing);
    }
}

/// Shared refresh coordination state
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Debug, Clone)]
pub struct RenewalCoordinator {
    inner: Arc<Inner>,
}

impl RenewalCoordinator {
    /// Coordinator that opens after `max_failures` consecutive failures
    ///
    /// A limit of zero is raised to one.
    pub fn new(max_failures: u32) -> Self {
        let (refreshing, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                max_failures: max_failures.max(1),
                state: Mutex::new(State::default()),
                refreshing,
            }),
        }
    }

    /// Decide what a request that received a 401 should do
    ///
    /// Returning [`RefreshDecision::Start`] atomically marks a refresh as in
    /// flight; the flag clears when the permit is dropped.
    pub fn should_start_refresh(&self) -> RefreshDecision {
        let mut state = self.inner.state.lock();

        if state.failure_count >= self.inner.max_failures {
            debug!(failure_count = state.failure_count, "Refresh circuit is open");
            return RefreshDecision::CircuitOpen;
        }
        if state.is_refreshing {
            return RefreshDecision::Wait;
        }

        state.is_refreshing = true;
        self.inner.refreshing.send_replace(true);
        RefreshDecision::Start(RefreshPermit { inner: Arc::clone(&self.inner) })
    }

    /// Set the in-flight flag directly
    ///
    /// Normally driven by [`RefreshPermit`]; clearing wakes every waiter.
    pub fn mark_refreshing(&self, refreshing: bool) {
        self.inner.set_refreshing(refreshing);
    }

    /// Record the result of a refresh attempt
    pub fn record_outcome(&self, success: bool) -> BreakerStatus {
        let mut state = self.inner.state.lock();

        if success {
            if state.failure_count > 0 {
                debug!(previous_failures = state.failure_count, "Refresh succeeded, breaker reset");
            }
            state.failure_count = 0;
            return BreakerStatus::Closed;
        }

        state.failure_count = (state.failure_count + 1).min(self.inner.max_failures);
        if state.failure_count >= self.inner.max_failures {
            warn!(
                failure_count = state.failure_count,
                max_failures = self.inner.max_failures,
                "Refresh failure limit reached"
            );
            BreakerStatus::Tripped
        } else {
            debug!(failure_count = state.failure_count, "Refresh failed");
            BreakerStatus::Closed
        }
    }

    /// Wait for the in-flight refresh to resolve, for at most `ceiling`
    ///
    /// Returns `true` once no refresh is in flight, `false` on timeout.
    pub async fn wait_until_idle(&self, ceiling: Duration) -> bool {
        let mut refreshing = self.inner.refreshing.subscribe();
        let outcome = tokio::time::timeout(ceiling, refreshing.wait_for(|busy| !*busy)).await;
        matches!(outcome, Ok(Ok(_)))
    }

    /// Close the breaker after a fresh login or registration
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.failure_count = 0;
    }

    /// Consecutive failed refreshes, capped at `max_failures`
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.state.lock().failure_count
    }

    /// Configured failure limit
    #[must_use]
    pub fn max_failures(&self) -> u32 {
        self.inner.max_failures
    }

    /// Whether a refresh is currently in flight
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().is_refreshing
    }

    /// Whether the breaker is open
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        self.inner.state.lock().failure_count >= self.inner.max_failures
    }
}

impl Default for RenewalCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES)
    }
}

/// Proof that the holder is the single in-flight refresher
///
/// Dropping the permit clears the refreshing flag on every exit path,
/// including errors and unwinding.
#[derive(Debug)]
#[must_use = "dropping the permit immediately ends the refresh"]
pub struct RefreshPermit {
    inner: Arc<Inner>,
}

impl RefreshPermit {
    /// End the refresh now
    pub fn release(self) {}
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.inner.set_refreshing(false);
    }
}
