//! Reactive token renewal
//!
//! Decides what a request that received a 401 does next. At most one refresh
//! is in flight at a time; requests that fail while it runs wait for it
//! instead of starting their own. Repeated refresh failures open the
//! coordinator's breaker, which ends the session.
//!
//! [`ReactiveRenewal::exchange`] is the renewal primitive shared with the
//! proactive scheduler: trade the stored refresh token for a new access token
//! and persist it if the session has not changed in the meantime.

use std::sync::Arc;
use std::time::Duration;

use relaycrm_common::{BreakerStatus, RefreshDecision, RenewalCoordinator};
use relaycrm_domain::TokenPair;
use tracing::{debug, info, warn};

use super::backend::AuthBackend;
use super::errors::ApiError;
use crate::vault::{CredentialVault, RenewalWrite};

/// Per-request retry bookkeeping
///
/// A logical request is retried at most once after a 401.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestMarker {
    retried: bool,
}

impl RequestMarker {
    /// Marker for a request that has not been resent yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the request already used its one resend
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Record the resend; a later 401 for this request surfaces as-is
    pub fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Result of one refresh-token exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// New tokens were persisted
    Renewed,
    /// The session ended or was replaced while the refresh was in flight
    Discarded,
    /// No refresh token is stored; renewal is impossible
    MissingRefreshToken,
}

/// 401 handling shared by every request of the pipeline
#[derive(Clone)]
pub struct ReactiveRenewal {
    coordinator: RenewalCoordinator,
    vault: Arc<CredentialVault>,
    backend: Arc<dyn AuthBackend>,
    wait_ceiling: Duration,
}

impl ReactiveRenewal {
    pub fn new(
        coordinator: RenewalCoordinator,
        vault: Arc<CredentialVault>,
        backend: Arc<dyn AuthBackend>,
        wait_ceiling: Duration,
    ) -> Self {
        Self { coordinator, vault, backend, wait_ceiling }
    }

    pub fn coordinator(&self) -> &RenewalCoordinator {
        &self.coordinator
    }

    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    /// Trade the stored refresh token for a new access token
    ///
    /// Does not touch the coordinator; callers hold the permit and record the
    /// outcome themselves.
    ///
    /// # Errors
    ///
    /// Returns the refresh call's failure unchanged.
    pub async fn exchange(&self) -> Result<Exchange, ApiError> {
        let generation = self.vault.generation();
        let Some(refresh_token) = self.vault.refresh_token() else {
            return Ok(Exchange::MissingRefreshToken);
        };

        let response = self.backend.refresh(&refresh_token).await?;
        let rotated = response.refresh_token.is_some();
        let tokens = TokenPair::new(response.token, response.refresh_token);

        match self.vault.persist_renewal(generation, tokens).await {
            RenewalWrite::Applied => {
                info!(rotated, "access token renewed");
                Ok(Exchange::Renewed)
            }
            RenewalWrite::Stale => Ok(Exchange::Discarded),
        }
    }

    /// Handle a 401 for the request that sent `sent_token`
    ///
    /// `Ok(())` means the request should be sent again with the current
    /// access token; the marker has been set. `Err` is the error to surface:
    /// `original` for every outcome except a failed refresh call, which
    /// surfaces its own error.
    pub async fn on_unauthorized(
        &self,
        marker: &mut RequestMarker,
        sent_token: Option<&str>,
        original: ApiError,
    ) -> Result<(), ApiError> {
        if marker.is_retried() {
            debug!("request already retried once; giving up");
            return Err(original);
        }

        if self.coordinator.is_circuit_open() {
            warn!("refresh breaker is open; ending session");
            self.end_session().await;
            return Err(original);
        }

        if self.rotated_since(sent_token) {
            debug!("access token rotated while the request was in flight");
            marker.mark_retried();
            return Ok(());
        }

        let permit = match self.coordinator.should_start_refresh() {
            RefreshDecision::Start(permit) => permit,
            RefreshDecision::Wait => {
                debug!(ceiling = ?self.wait_ceiling, "waiting for in-flight refresh");
                let resolved = self.coordinator.wait_until_idle(self.wait_ceiling).await;
                if resolved && self.vault.access_token().is_some() {
                    marker.mark_retried();
                    return Ok(());
                }
                return Err(original);
            }
            RefreshDecision::CircuitOpen => {
                warn!("refresh breaker is open; ending session");
                self.end_session().await;
                return Err(original);
            }
        };

        // Another refresher may have finished between the check above and
        // taking the permit.
        if self.rotated_since(sent_token) {
            permit.release();
            marker.mark_retried();
            return Ok(());
        }

        marker.mark_retried();
        match self.exchange().await {
            Ok(Exchange::Renewed) => {
                self.coordinator.record_outcome(true);
                permit.release();
                Ok(())
            }
            Ok(Exchange::Discarded) => {
                permit.release();
                Err(original)
            }
            Ok(Exchange::MissingRefreshToken) => {
                warn!("no refresh token stored; ending session");
                self.end_session().await;
                permit.release();
                Err(original)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                if self.coordinator.record_outcome(false) == BreakerStatus::Tripped {
                    self.end_session().await;
                }
                permit.release();
                Err(err)
            }
        }
    }

    async fn end_session(&self) {
        // Store failures are already logged by the vault.
        let _ = self.vault.clear().await;
    }

    fn rotated_since(&self, sent_token: Option<&str>) -> bool {
        match self.vault.access_token() {
            Some(current) => sent_token != Some(current.as_str()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use relaycrm_common::{CredentialSlot, MemoryCredentialStore};
    use relaycrm_domain::UserProfile;

    use super::*;
    use crate::testing::MockAuthBackend;

    fn profile() -> UserProfile {
        UserProfile {
            id: 1,
            email: "a@relaycrm.test".into(),
            name: "A".into(),
            role: "sales".into(),
            team_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    async fn fixture(refresh: Option<&str>) -> (ReactiveRenewal, Arc<MockAuthBackend>, MemoryCredentialStore) {
        let store = MemoryCredentialStore::new();
        let vault = Arc::new(CredentialVault::new(Arc::new(store.clone())));
        vault
            .establish(TokenPair::new("a1", refresh.map(str::to_string)), profile())
            .await
            .unwrap();
        let backend = Arc::new(MockAuthBackend::new());
        let renewal = ReactiveRenewal::new(
            RenewalCoordinator::new(3),
            vault,
            backend.clone(),
            Duration::from_millis(200),
        );
        (renewal, backend, store)
    }

    fn unauthorized() -> ApiError {
        ApiError::Unauthorized("expired".into())
    }

    #[tokio::test]
    async fn successful_refresh_allows_one_retry() {
        let (renewal, backend, store) = fixture(Some("r1")).await;
        backend.set_refresh_token_response("a2", None);
        let mut marker = RequestMarker::new();

        renewal.on_unauthorized(&mut marker, Some("a1"), unauthorized()).await.unwrap();

        assert!(marker.is_retried());
        assert_eq!(backend.refresh_calls(), 1);
        assert_eq!(store.peek(CredentialSlot::AccessToken).as_deref(), Some("a2"));
        assert!(!renewal.coordinator().is_refreshing());

        let err = renewal.on_unauthorized(&mut marker, Some("a2"), unauthorized()).await;
        assert!(matches!(err, Err(ApiError::Unauthorized(_))));
        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn stale_401_retries_without_refreshing() {
        let (renewal, backend, _store) = fixture(Some("r1")).await;
        let mut marker = RequestMarker::new();

        renewal.on_unauthorized(&mut marker, Some("a0"), unauthorized()).await.unwrap();

        assert!(marker.is_retried());
        assert_eq!(backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn missing_refresh_token_ends_session() {
        let (renewal, backend, store) = fixture(None).await;
        let mut marker = RequestMarker::new();

        let err = renewal.on_unauthorized(&mut marker, Some("a1"), unauthorized()).await;

        assert!(matches!(err, Err(ApiError::Unauthorized(_))));
        assert_eq!(backend.refresh_calls(), 0);
        assert!(store.is_empty());
        assert_eq!(renewal.coordinator().failure_count(), 0);
    }

    #[tokio::test]
    async fn refresh_failures_trip_breaker_and_clear() {
        let (renewal, backend, store) = fixture(Some("r1")).await;
        backend.set_should_fail(true);

        for attempt in 1..=3 {
            let mut marker = RequestMarker::new();
            let err = renewal.on_unauthorized(&mut marker, Some("a1"), unauthorized()).await;
            assert!(err.is_err());
            assert_eq!(renewal.coordinator().failure_count(), attempt);
        }

        assert!(store.is_empty());
        assert!(renewal.vault().access_token().is_none());

        let mut marker = RequestMarker::new();
        let err = renewal.on_unauthorized(&mut marker, None, unauthorized()).await;
        assert!(matches!(err, Err(ApiError::Unauthorized(_))));
        assert_eq!(backend.refresh_calls(), 3);
    }

    #[test]
    fn marker_allows_a_single_resend() {
        let mut marker = RequestMarker::new();
        assert!(!marker.is_retried());

        marker.mark_retried();
        marker.mark_retried();

        assert!(marker.is_retried());
        assert_eq!(marker, RequestMarker { retried: true });
    }

    #[tokio::test]
    async fn waiter_gives_up_after_ceiling() {
        let (renewal, backend, _store) = fixture(Some("r1")).await;
        let RefreshDecision::Start(permit) = renewal.coordinator().should_start_refresh() else {
            panic!("expected to become the refresher");
        };
        let mut marker = RequestMarker::new();

        let err = renewal.on_unauthorized(&mut marker, Some("a1"), unauthorized()).await;

        assert!(matches!(err, Err(ApiError::Unauthorized(_))));
        assert!(!marker.is_retried());
        assert_eq!(backend.refresh_calls(), 0);
        drop(permit);
    }
}
