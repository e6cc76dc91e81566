//! Proactive renewal scheduler
//!
//! Periodically renews the access token before it expires so requests rarely
//! see a 401 at all. Runs only while a session is active.

use std::sync::Arc;
use std::time::Duration;

use relaycrm_common::auth::inspector;
use relaycrm_common::RefreshDecision;
use relaycrm_domain::constants::{DEFAULT_PROACTIVE_HORIZON_SECS, DEFAULT_PROACTIVE_INTERVAL_SECS};
use relaycrm_domain::{AuthState, RenewalConfig};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::errors::ApiError;
use super::renewal::{Exchange, ReactiveRenewal};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the renewal scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between expiry checks
    pub interval: Duration,
    /// Renew when less than this many seconds remain
    pub horizon_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_PROACTIVE_INTERVAL_SECS),
            horizon_secs: DEFAULT_PROACTIVE_HORIZON_SECS,
        }
    }
}

impl From<&RenewalConfig> for SchedulerConfig {
    fn from(config: &RenewalConfig) -> Self {
        Self {
            interval: config.proactive_interval(),
            horizon_secs: config.proactive_horizon_secs,
        }
    }
}

/// Scheduler lifecycle errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,
    #[error("Scheduler not running")]
    NotRunning,
    #[error("Scheduler task panicked")]
    TaskPanicked,
    #[error("Scheduler task did not stop within {0:?}")]
    StopTimeout(Duration),
}

/// What one scheduler check did
#[derive(Debug)]
pub enum RenewalTick {
    /// The access token is not close to expiry
    Fresh,
    /// Nothing to do: no session, no refresh token, or renewal already
    /// handled elsewhere
    Skipped,
    /// New tokens were persisted
    Renewed,
    /// The session ended while the refresh was in flight
    Discarded,
    /// The refresh call failed; the failure is logged and swallowed
    Ignored(ApiError),
}

/// Background task renewing the access token ahead of expiry
pub struct RenewalScheduler {
    renewal: ReactiveRenewal,
    config: SchedulerConfig,
    cancellation_token: parking_lot::Mutex<CancellationToken>,
    task_handle: TaskHandle,
}

impl RenewalScheduler {
    pub fn new(renewal: ReactiveRenewal, config: SchedulerConfig) -> Self {
        Self {
            renewal,
            config,
            cancellation_token: parking_lot::Mutex::new(CancellationToken::new()),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start the scheduler
    ///
    /// The task ends on its own once the session is no longer authenticated.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if the task is still alive
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut handle = self.task_handle.lock().await;
        if handle.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        // A fresh token supports restart after stop
        let cancel = CancellationToken::new();
        *self.cancellation_token.lock() = cancel.clone();

        let renewal = self.renewal.clone();
        let config = self.config.clone();
        let state = renewal.vault().subscribe();
        *handle = Some(tokio::spawn(Self::renewal_loop(renewal, config, cancel, state)));

        info!(interval_secs = self.config.interval.as_secs(), "Renewal scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if the task was never started or
    /// was already stopped
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        self.cancellation_token.lock().cancel();

        let Some(handle) = self.task_handle.lock().await.take() else {
            return Err(SchedulerError::NotRunning);
        };

        let timeout = Duration::from_secs(5);
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                info!("Renewal scheduler stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Renewal scheduler task panicked");
                Err(SchedulerError::TaskPanicked)
            }
            Err(_) => {
                warn!("Renewal scheduler task did not complete within timeout");
                Err(SchedulerError::StopTimeout(timeout))
            }
        }
    }

    /// Whether the background task is alive
    pub async fn is_running(&self) -> bool {
        self.task_handle.lock().await.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Run a single check now
    pub async fn run_once(&self) -> RenewalTick {
        Self::check(&self.renewal, self.config.horizon_secs).await
    }

    async fn renewal_loop(
        renewal: ReactiveRenewal,
        config: SchedulerConfig,
        cancel: CancellationToken,
        mut state: watch::Receiver<AuthState>,
    ) {
        let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Renewal loop cancelled");
                    break;
                }
                changed = state.changed() => {
                    if changed.is_err() || !state.borrow_and_update().is_authenticated() {
                        debug!("Session ended; renewal loop exiting");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    // Dropping an in-flight check releases its refresh permit
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!("Renewal loop cancelled during check");
                            break;
                        }
                        tick = Self::check(&renewal, config.horizon_secs) => {
                            debug!(?tick, "Proactive renewal check");
                        }
                    }
                }
            }
        }
    }

    async fn check(renewal: &ReactiveRenewal, horizon_secs: u64) -> RenewalTick {
        let Some(access_token) = renewal.vault().access_token() else {
            return RenewalTick::Skipped;
        };
        if !inspector::is_expiring_soon(&access_token, horizon_secs) {
            return RenewalTick::Fresh;
        }
        if renewal.vault().refresh_token().is_none() {
            debug!("Access token expiring but no refresh token stored");
            return RenewalTick::Skipped;
        }

        let permit = match renewal.coordinator().should_start_refresh() {
            RefreshDecision::Start(permit) => permit,
            RefreshDecision::Wait | RefreshDecision::CircuitOpen => return RenewalTick::Skipped,
        };

        let tick = match renewal.exchange().await {
            Ok(Exchange::Renewed) => {
                renewal.coordinator().record_outcome(true);
                RenewalTick::Renewed
            }
            Ok(Exchange::Discarded) => RenewalTick::Discarded,
            Ok(Exchange::MissingRefreshToken) => RenewalTick::Skipped,
            Err(e) => {
                warn!(error = %e, "Proactive renewal failed");
                RenewalTick::Ignored(e)
            }
        };
        permit.release();
        tick
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for RenewalScheduler {
    fn drop(&mut self) {
        let token = self.cancellation_token.get_mut();
        if !token.is_cancelled() {
            debug!("RenewalScheduler dropped; cancelling");
            token.cancel();
        }
    }
}
