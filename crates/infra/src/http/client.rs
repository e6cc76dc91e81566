//! Shared HTTP transport
//!
//! Both the auth backend and the request pipeline send through
//! [`HttpClient`]. Every request gets exactly one attempt; the only resend in
//! the system is the pipeline's single retry after a successful renewal.

use std::time::{Duration, Instant};

use relaycrm_domain::constants::{DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::api::errors::ApiError;

/// reqwest client bound to one API base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client for `base_url` with the default timeout
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the TLS backend cannot be initialised.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::builder().base_url(base_url).build()
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for an endpoint path such as `/auth/me`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Request builder for `path` under the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send once and map transport failures
    ///
    /// Any HTTP status counts as a response here; classifying it is up to the
    /// caller.
    ///
    /// # Errors
    ///
    /// `ApiError::Timeout` when the deadline passes, `ApiError::Network` for
    /// connection failures.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request = builder.build().map_err(|err| ApiError::from_transport(&err, self.timeout))?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        let started = Instant::now();

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(
                    %method,
                    %path,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "HTTP response"
                );
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %path, error = %err, "HTTP request failed");
                Err(ApiError::from_transport(&err, self.timeout))
            }
        }
    }

    /// Turn a non-success response into an [`ApiError`]
    ///
    /// Uses the server's `{"error": ...}` message when the body carries one.
    pub async fn error_for(response: Response, fallback: impl Into<String>) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, &body, fallback)
    }
}

/// Builder for [`HttpClient`]
#[derive(Debug)]
pub struct HttpClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            user_agent: concat!("relaycrm-session/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// # Errors
    ///
    /// Returns `ApiError::Config` for an empty base URL or when reqwest
    /// cannot build its client.
    pub fn build(self) -> Result<HttpClient, ApiError> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Config("API base URL must not be empty".into()));
        }

        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .no_proxy()
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client, base_url, timeout: self.timeout })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::StatusCode;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn joins_paths_under_base_url() {
        let client = HttpClient::new("https://crm.example.com/api/").unwrap();
        assert_eq!(client.base_url(), "https://crm.example.com/api");
        assert_eq!(client.url("/auth/me"), "https://crm.example.com/api/auth/me");
        assert_eq!(client.url("contacts"), "https://crm.example.com/api/contacts");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(matches!(HttpClient::new("  "), Err(ApiError::Config(_))));
    }

    #[tokio::test]
    async fn sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ping"))
            .and(header("User-Agent", "relaycrm-test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .base_url(format!("{}/api", server.uri()))
            .user_agent("relaycrm-test")
            .build()
            .unwrap();
        let response = client.send(client.request(Method::GET, "/ping")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(server.uri()).unwrap();
        let response = client.send(client.request(Method::GET, "/contacts")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let err = HttpClient::error_for(response, "contacts unavailable").await;
        assert!(matches!(err, ApiError::Server(ref m) if m == "contacts unavailable"));
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .base_url(server.uri())
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let result = client.send(client.request(Method::GET, "/slow")).await;

        assert!(matches!(result, Err(ApiError::Timeout(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(format!("http://{addr}")).unwrap();
        let result = client.send(client.request(Method::GET, "/")).await;

        assert!(matches!(result, Err(ApiError::Network(_))), "got {result:?}");
    }
}
