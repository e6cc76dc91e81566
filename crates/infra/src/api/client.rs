//! Request pipeline
//!
//! Every authenticated API call goes through [`ApiClient`]. It attaches the
//! current access token, classifies the response, and hands 401s to
//! [`ReactiveRenewal`] before deciding whether to send the request once more.

use std::sync::Arc;
use std::time::Duration;

use relaycrm_domain::constants::{DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::errors::ApiError;
use super::renewal::{ReactiveRenewal, RequestMarker};
use crate::http::HttpClient;
use crate::vault::CredentialVault;

/// Configuration for API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for API (e.g., "http://localhost:3000/api")
    pub base_url: String,
    /// Timeout for API requests
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        }
    }
}

/// API client that renews the session on 401
#[derive(Clone)]
pub struct ApiClient {
    http_client: HttpClient,
    renewal: ReactiveRenewal,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: ApiClientConfig, renewal: ReactiveRenewal) -> Result<Self, ApiError> {
        let http_client =
            HttpClient::builder().base_url(config.base_url).timeout(config.timeout).build()?;
        Ok(Self::with_client(http_client, renewal))
    }

    /// Create an API client over an existing transport
    pub fn with_client(http_client: HttpClient, renewal: ReactiveRenewal) -> Self {
        Self { http_client, renewal }
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        self.http_client.base_url()
    }

    fn vault(&self) -> &Arc<CredentialVault> {
        self.renewal.vault()
    }

    /// Execute a GET request
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute::<(), T>(Method::GET, path, None).await
    }

    /// Execute a POST request
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        self.execute(Method::POST, path, Some(body)).await
    }

    /// Execute a PUT request
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn put<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        self.execute(Method::PUT, path, Some(body)).await
    }

    /// Execute a PATCH request
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn patch<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        self.execute(Method::PATCH, path, Some(body)).await
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    ///
    /// Returns error if request fails or response cannot be deserialized
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute::<(), T>(Method::DELETE, path, None).await
    }

    async fn execute<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<R, ApiError> {
        let url = self.http_client.url(path);
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::Client(format!("Failed to serialize body: {e}")))?;
        let mut marker = RequestMarker::new();

        loop {
            let token = self.vault().access_token();
            debug!(%method, url = %url, authenticated = token.is_some(), retried = marker.is_retried(), "API request");

            let mut request = self.http_client.request(method.clone(), path);
            if let Some(token) = &token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = self.http_client.send(request).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                let error = HttpClient::error_for(response, format!("{url} returned status {status}")).await;
                self.renewal.on_unauthorized(&mut marker, token.as_deref(), error).await?;
                continue;
            }

            let result = Self::decode(response, &url).await?;
            info!(%method, path = %path, "API request successful");
            return Ok(result);
        }
    }

    async fn decode<R: DeserializeOwned>(response: Response, url: &str) -> Result<R, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(HttpClient::error_for(response, format!("{url} returned status {status}")).await);
        }

        // 204/205 carry no body
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                ApiError::Client(format!(
                    "No content response ({}), but response type cannot be deserialized from empty body",
                    status.as_u16()
                ))
            });
        }

        response.json().await.map_err(|e| ApiError::Client(format!("Failed to parse response: {e}")))
    }
}

/// Builder for API client
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiClientConfig>,
    renewal: Option<ReactiveRenewal>,
}

impl ApiClientBuilder {
    /// Set the API configuration
    pub fn config(mut self, config: ApiClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the renewal handler (and through it, the credential vault)
    pub fn renewal(mut self, renewal: ReactiveRenewal) -> Self {
        self.renewal = Some(renewal);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    ///
    /// Returns error if required fields are missing or client creation fails
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let renewal = self
            .renewal
            .ok_or_else(|| ApiError::Config("Renewal handler not set".to_string()))?;

        ApiClient::new(config, renewal)
    }
}

#[cfg(test)]
mod tests {
    use relaycrm_common::{MemoryCredentialStore, RenewalCoordinator};
    use relaycrm_domain::{TokenPair, UserProfile};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::testing::MockAuthBackend;

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    struct TestResponse {
        message: String,
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: 9,
            email: "noa@relaycrm.test".into(),
            name: "Noa".into(),
            role: "sales".into(),
            team_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    async fn client_for(
        server: &MockServer,
        tokens: Option<TokenPair>,
    ) -> (ApiClient, Arc<MockAuthBackend>) {
        let vault = Arc::new(CredentialVault::new(Arc::new(MemoryCredentialStore::new())));
        if let Some(tokens) = tokens {
            vault.establish(tokens, profile()).await.unwrap();
        }
        let backend = Arc::new(MockAuthBackend::new());
        let renewal = ReactiveRenewal::new(
            RenewalCoordinator::default(),
            vault,
            backend.clone(),
            Duration::from_millis(500),
        );
        let config = ApiClientConfig { base_url: server.uri(), ..Default::default() };
        (ApiClient::new(config, renewal).unwrap(), backend)
    }

    #[tokio::test]
    async fn test_builder_missing_renewal() {
        let result = ApiClient::builder().build();
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn test_get_attaches_bearer_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .and(header("Authorization", "Bearer a1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(TestResponse { message: "success".to_string() }),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server, Some(TokenPair::new("a1", None))).await;

        let result: TestResponse = client.get("/contacts").await.unwrap();
        assert_eq!(result.message, "success");
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_session() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server, None).await;

        let result: Result<(), ApiError> = client.get("/health").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_post_with_205_reset_content() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset"))
            .respond_with(ResponseTemplate::new(205))
            .mount(&mock_server)
            .await;

        let (client, _) = client_for(&mock_server, Some(TokenPair::new("a1", None))).await;

        let result: Result<(), ApiError> =
            client.post("/reset", &serde_json::json!({"all": true})).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_business_errors_pass_through() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/contacts/4"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({"error": "Admins only"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (client, backend) =
            client_for(&mock_server, Some(TokenPair::new("a1", Some("r1".into())))).await;

        let err = client.delete::<serde_json::Value>("/contacts/4").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(ref m) if m == "Admins only"));
        assert_eq!(backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_401_refreshes_and_retries_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(header("Authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deals"))
            .and(header("Authorization", "Bearer a2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (client, backend) =
            client_for(&mock_server, Some(TokenPair::new("a1", Some("r1".into())))).await;
        backend.set_refresh_token_response("a2", None);

        let deals: Vec<serde_json::Value> = client.get("/deals").await.unwrap();
        assert!(deals.is_empty());
        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried_again() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deals"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&mock_server)
            .await;

        let (client, backend) =
            client_for(&mock_server, Some(TokenPair::new("a1", Some("r1".into())))).await;

        let err = client.get::<serde_json::Value>("/deals").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(backend.refresh_calls(), 1);
    }
}
