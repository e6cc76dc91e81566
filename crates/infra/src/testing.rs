//! In-memory auth backend for tests
//!
//! Counts every call so tests can assert how many refreshes actually reached
//! the "server".

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relaycrm_domain::{
    AuthResponse, LoginRequest, RefreshResponse, RegisterRequest, UserProfile,
};

use crate::api::backend::AuthBackend;
use crate::api::errors::ApiError;

/// Scriptable [`AuthBackend`]
///
/// By default login and registration succeed for any credentials and each
/// refresh returns a fresh `renewed-<n>` access token.
#[derive(Debug, Default)]
pub struct MockAuthBackend {
    should_fail: AtomicBool,
    refresh_delay: Mutex<Option<Duration>>,
    refresh_response: Mutex<Option<(String, Option<String>)>>,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockAuthBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `ApiError::Unauthorized`
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Delay refresh responses, to hold a refresh in flight
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = Some(delay);
    }

    /// Fix the tokens returned by the next refreshes
    pub fn set_refresh_token_response(&self, access: &str, refresh: Option<&str>) {
        *self.refresh_response.lock() = Some((access.to_string(), refresh.map(str::to_string)));
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn was_refresh_called(&self) -> bool {
        self.refresh_calls() > 0
    }

    fn check(&self, message: &str) -> Result<(), ApiError> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err(ApiError::Unauthorized(message.to_string()))
        } else {
            Ok(())
        }
    }

    fn session_for(email: &str, name: &str) -> AuthResponse {
        AuthResponse {
            token: format!("access-for-{email}"),
            refresh_token: Some(format!("refresh-for-{email}")),
            user: UserProfile {
                id: 1,
                email: email.to_string(),
                name: name.to_string(),
                role: "sales".into(),
                team_id: None,
                created_at: None,
                updated_at: None,
            },
        }
    }
}

#[async_trait]
impl AuthBackend for MockAuthBackend {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.check("Invalid credentials")?;
        Ok(Self::session_for(&request.email, "Mock User"))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.check("Email already registered")?;
        Ok(Self::session_for(&request.email, &request.name))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check("Invalid refresh token")?;

        let scripted = self.refresh_response.lock().clone();
        let (token, refresh_token) = scripted.unwrap_or_else(|| (format!("renewed-{call}"), None));
        Ok(RefreshResponse { token, refresh_token })
    }

    async fn logout(&self, _access_token: &str) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.check("Session expired")
    }
}
