//! Auth endpoints that bypass the request pipeline
//!
//! Login, registration, refresh, and logout never go through
//! [`ApiClient`](super::client::ApiClient): a 401 from any of them is a final
//! answer, not a reason to renew.

use std::time::Duration;

use async_trait::async_trait;
use relaycrm_domain::constants::{
    AUTH_LOGIN_PATH, AUTH_LOGOUT_PATH, AUTH_REFRESH_PATH, AUTH_REGISTER_PATH,
    LOGIN_FAILED_MESSAGE, REGISTRATION_FAILED_MESSAGE,
};
use relaycrm_domain::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use super::errors::ApiError;
use crate::http::HttpClient;

/// Unauthenticated calls against the auth endpoints
///
/// This trait allows dependency injection and testing with mock backends.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    /// `POST /auth/register`
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    /// `POST /auth/refresh`; the renewal primitive
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError>;

    /// `POST /auth/logout` carrying the access token being retired
    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;
}

/// [`AuthBackend`] over HTTP
pub struct HttpAuthBackend {
    http: HttpClient,
}

impl HttpAuthBackend {
    /// Create a backend for `base_url`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = HttpClient::builder().base_url(base_url).timeout(timeout).build()?;
        Ok(Self::with_client(http))
    }

    /// Create a backend sharing an existing HTTP client
    pub fn with_client(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, fallback: &str) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        debug!(path, "auth POST");

        let response = self.http.send(self.http.request(Method::POST, path).json(body)).await?;
        if !response.status().is_success() {
            return Err(HttpClient::error_for(response, fallback).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Client(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    #[instrument(skip_all, fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.post_json(AUTH_LOGIN_PATH, request, LOGIN_FAILED_MESSAGE).await
    }

    #[instrument(skip_all, fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.post_json(AUTH_REGISTER_PATH, request, REGISTRATION_FAILED_MESSAGE).await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let request = RefreshRequest { refresh_token: refresh_token.to_string() };
        let fallback = format!("{} refused the refresh token", self.http.url(AUTH_REFRESH_PATH));
        self.post_json(AUTH_REFRESH_PATH, &request, &fallback).await
    }

    #[instrument(skip_all)]
    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        let request = self.http.request(Method::POST, AUTH_LOGOUT_PATH).bearer_auth(access_token);

        let response = self.http.send(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let fallback = format!("{} returned status {status}", self.http.url(AUTH_LOGOUT_PATH));
        Err(HttpClient::error_for(response, fallback).await)
    }
}
