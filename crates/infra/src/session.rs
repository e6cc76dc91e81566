//! Session facade
//!
//! [`SessionService`] is the externally visible authentication state
//! machine. It wires the credential vault, the request pipeline, reactive
//! renewal, and the proactive scheduler together and exposes login,
//! registration, logout, and password changes.
//!
//! ```text
//! Initializing ──initialize()──► Authenticated(profile)
//!      │                              │   ▲
//!      ▼                              │   │ login() / register()
//! Unauthenticated ◄── logout(), renewal exhaustion, failed revalidation
//! ```

use std::sync::Arc;

use relaycrm_common::{BestEffort, CredentialStore, RenewalCoordinator, StoreError};
use relaycrm_domain::constants::{
    AUTH_CHANGE_PASSWORD_PATH, AUTH_ME_PATH, CHANGE_PASSWORD_FAILED_MESSAGE,
    LOGIN_FAILED_MESSAGE, REGISTRATION_FAILED_MESSAGE,
};
use relaycrm_domain::{
    AuthResponse, AuthState, ChangePasswordRequest, DomainError, LoginRequest, MessageResponse,
    RegisterRequest, SessionConfig, TokenPair, UserProfile,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::api::backend::{AuthBackend, HttpAuthBackend};
use crate::api::client::{ApiClient, ApiClientConfig};
use crate::api::errors::ApiError;
use crate::api::renewal::ReactiveRenewal;
use crate::api::scheduler::{RenewalScheduler, SchedulerConfig, SchedulerError};
use crate::storage::build_store;
use crate::vault::CredentialVault;

/// Session operation errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server refused the request; carries its message
    #[error("{0}")]
    Rejected(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] DomainError),
}

impl SessionError {
    /// Surface 4xx answers as the server's message, keep everything else
    fn from_api(err: ApiError, fallback: &str) -> Self {
        if err.is_rejection() {
            let message = err.message().map_or_else(|| fallback.to_string(), str::to_string);
            Self::Rejected(message)
        } else {
            Self::Api(err)
        }
    }
}

/// What happened to each step of a logout
///
/// Logout always ends the local session; these record the steps that could
/// not be completed.
#[derive(Debug)]
pub struct LogoutReport {
    /// `POST /auth/logout`
    pub server: BestEffort<ApiError>,
    /// Removing stored credentials
    pub storage: BestEffort<StoreError>,
}

impl LogoutReport {
    /// Whether every step completed
    pub fn is_clean(&self) -> bool {
        self.server.is_done() && self.storage.is_done()
    }
}

/// Client session lifecycle
pub struct SessionService {
    vault: Arc<CredentialVault>,
    backend: Arc<dyn AuthBackend>,
    renewal: ReactiveRenewal,
    api: ApiClient,
    scheduler: RenewalScheduler,
}

impl SessionService {
    /// Wire a session over an explicit store and auth backend
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if `config` is invalid and
    /// `SessionError::Api` if the HTTP client cannot be built.
    pub fn new(
        config: &SessionConfig,
        store: Arc<dyn CredentialStore>,
        backend: Arc<dyn AuthBackend>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let vault = Arc::new(CredentialVault::new(store));
        let renewal = ReactiveRenewal::new(
            RenewalCoordinator::new(config.renewal.max_failures),
            Arc::clone(&vault),
            Arc::clone(&backend),
            config.renewal.wait_ceiling(),
        );
        let api = ApiClient::new(
            ApiClientConfig {
                base_url: config.api.base_url.clone(),
                timeout: config.api.timeout(),
            },
            renewal.clone(),
        )?;
        let scheduler = RenewalScheduler::new(renewal.clone(), SchedulerConfig::from(&config.renewal));

        Ok(Self { vault, backend, renewal, api, scheduler })
    }

    /// Wire a session entirely from configuration
    ///
    /// # Errors
    ///
    /// See [`SessionService::new`].
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let store = build_store(&config.storage)?;
        let backend = HttpAuthBackend::new(&config.api.base_url, config.api.timeout())?;
        Self::new(config, store, Arc::new(backend))
    }

    /// Restore a stored session
    ///
    /// A restored session is reported as authenticated right away, then
    /// revalidated with `GET /auth/me`. Any failure ends it.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> AuthState {
        match self.vault.load().await {
            Ok(true) => {}
            Ok(false) => {
                if self.vault.access_token().is_some() {
                    // Token without a profile cannot be shown as a session
                    self.end_session().await;
                }
                return self.state();
            }
            Err(err) => {
                warn!(error = %err, "failed to load stored credentials");
                self.end_session().await;
                return self.state();
            }
        }

        match self.api.get::<UserProfile>(AUTH_ME_PATH).await {
            Ok(user) => {
                if let Err(err) = self.vault.update_user(user).await {
                    warn!(error = %err, "failed to cache refreshed profile");
                }
                self.start_scheduler().await;
                info!("stored session revalidated");
            }
            Err(err) => {
                warn!(error = %err, "stored session failed revalidation");
                self.end_session().await;
            }
        }
        self.state()
    }

    /// Sign in with email and password
    ///
    /// # Errors
    ///
    /// `SessionError::Rejected` carries the server's message, or
    /// `"Login failed"` when it sent none.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };
        let response = self
            .backend
            .login(&request)
            .await
            .map_err(|err| SessionError::from_api(err, LOGIN_FAILED_MESSAGE))?;
        self.begin_session(response).await
    }

    /// Create an account and sign in
    ///
    /// # Errors
    ///
    /// `SessionError::Rejected` carries the server's message, or
    /// `"Registration failed"` when it sent none.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<UserProfile, SessionError> {
        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        };
        let response = self
            .backend
            .register(&request)
            .await
            .map_err(|err| SessionError::from_api(err, REGISTRATION_FAILED_MESSAGE))?;
        self.begin_session(response).await
    }

    async fn begin_session(&self, response: AuthResponse) -> Result<UserProfile, SessionError> {
        self.stop_scheduler().await;

        let user = response.user;
        let tokens = TokenPair::new(response.token, response.refresh_token);
        // Close the breaker before subscribers can see the new session
        self.renewal.coordinator().reset();
        self.vault.establish(tokens, user.clone()).await?;
        self.start_scheduler().await;

        info!(user_id = user.id, "session started");
        Ok(user)
    }

    /// End the session
    ///
    /// The server is told first, best-effort; local credentials are cleared
    /// no matter what it answers.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> LogoutReport {
        self.stop_scheduler().await;

        let server = match self.vault.access_token() {
            Some(token) => BestEffort::from_result(self.backend.logout(&token).await),
            None => BestEffort::Done,
        };
        if let Some(err) = server.ignored() {
            warn!(error = %err, "server logout failed; clearing local session anyway");
        }

        let storage = self.vault.clear().await;
        info!("logged out");
        LogoutReport { server, storage }
    }

    /// Change the signed-in user's password
    ///
    /// # Errors
    ///
    /// `SessionError::NotAuthenticated` without a session;
    /// `SessionError::Rejected` with the server's message when it refuses.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<MessageResponse, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }

        let request = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        self.api
            .post(AUTH_CHANGE_PASSWORD_PATH, &request)
            .await
            .map_err(|err| SessionError::from_api(err, CHANGE_PASSWORD_FAILED_MESSAGE))
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state().user().cloned()
    }

    pub fn access_token(&self) -> Option<String> {
        self.vault.access_token()
    }

    pub fn state(&self) -> AuthState {
        self.vault.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Receiver that observes every state transition
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.vault.subscribe()
    }

    /// Pipeline for the rest of the CRM API
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn coordinator(&self) -> &RenewalCoordinator {
        self.renewal.coordinator()
    }

    pub fn scheduler(&self) -> &RenewalScheduler {
        &self.scheduler
    }

    async fn start_scheduler(&self) {
        if let Err(err) = self.scheduler.start().await {
            warn!(error = %err, "proactive renewal not started");
        }
    }

    async fn stop_scheduler(&self) {
        match self.scheduler.stop().await {
            Ok(()) | Err(SchedulerError::NotRunning) => {}
            Err(err) => warn!(error = %err, "proactive renewal did not stop cleanly"),
        }
    }

    async fn end_session(&self) {
        self.stop_scheduler().await;
        // Store failures are already logged by the vault.
        let _ = self.vault.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use relaycrm_common::MemoryCredentialStore;
    use relaycrm_domain::StorageBackend;

    use super::*;
    use crate::testing::MockAuthBackend;

    fn service() -> (SessionService, Arc<MockAuthBackend>, MemoryCredentialStore) {
        let store = MemoryCredentialStore::new();
        let backend = Arc::new(MockAuthBackend::new());
        let service =
            SessionService::new(&SessionConfig::default(), Arc::new(store.clone()), backend.clone())
                .unwrap();
        (service, backend, store)
    }

    #[tokio::test]
    async fn login_then_logout() {
        let (service, backend, store) = service();
        let mut states = service.subscribe();

        let user = service.login("ada@relaycrm.test", "pw").await.unwrap();
        assert_eq!(user.email, "ada@relaycrm.test");
        assert!(states.borrow_and_update().is_authenticated());
        assert!(service.scheduler().is_running().await);

        let report = service.logout().await;
        assert!(report.is_clean());
        assert_eq!(backend.logout_calls(), 1);
        assert!(store.is_empty());
        assert_eq!(service.state(), AuthState::Unauthenticated);
        assert!(!service.scheduler().is_running().await);
    }

    #[tokio::test]
    async fn failed_login_keeps_state() {
        let (service, backend, store) = service();
        backend.set_should_fail(true);

        let err = service.login("ada@relaycrm.test", "wrong").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(ref m) if m == "Invalid credentials"));
        assert!(store.is_empty());
        assert!(!service.is_authenticated());
    }

    #[tokio::test]
    async fn logout_survives_server_failure() {
        let (service, backend, store) = service();
        service.register("bo@relaycrm.test", "pw", "Bo").await.unwrap();
        assert_eq!(backend.register_calls(), 1);
        backend.set_should_fail(true);

        let report = service.logout().await;
        assert!(report.server.ignored().is_some());
        assert!(report.storage.is_done());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn logout_without_session_skips_server() {
        let (service, backend, _) = service();

        let report = service.logout().await;
        assert!(report.is_clean());
        assert_eq!(backend.logout_calls(), 0);
    }

    #[tokio::test]
    async fn change_password_requires_session() {
        let (service, _, _) = service();
        let err = service.change_password("old", "new").await.unwrap_err();
        assert!(matches!(err, SessionError::NotAuthenticated));
    }

    #[tokio::test]
    async fn initialize_without_credentials_is_unauthenticated() {
        let (service, _, _) = service();
        assert!(service.state().is_loading());
        assert_eq!(service.initialize().await, AuthState::Unauthenticated);
    }

    #[test]
    fn from_config_rejects_invalid_config() {
        let mut config = SessionConfig::default();
        config.storage.backend = StorageBackend::File;
        assert!(matches!(SessionService::from_config(&config), Err(SessionError::Config(_))));
    }
}
