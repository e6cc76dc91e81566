//! API-specific error types
//!
//! Provides error classification for API operations.

use std::time::Duration;

use relaycrm_common::StoreError;
use relaycrm_domain::ServerErrorBody;
use reqwest::StatusCode;
use thiserror::Error;

/// Categories of API errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403)
    Authentication,
    /// Rate limiting errors (429)
    RateLimit,
    /// Server errors (5xx)
    Server,
    /// Client errors (4xx except auth)
    Client,
    /// Network/connection errors and timeouts
    Network,
    /// Local configuration or storage errors
    Local,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401; the only status that triggers token renewal
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Unauthorized(_) | Self::Forbidden(_) => ApiErrorCategory::Authentication,
            Self::RateLimit(_) => ApiErrorCategory::RateLimit,
            Self::Server(_) => ApiErrorCategory::Server,
            Self::Client(_) => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Config(_) | Self::Storage(_) => ApiErrorCategory::Local,
        }
    }

    /// Whether this is the 401 that drives token renewal
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Whether the server answered and refused the request (4xx)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::Authentication | ApiErrorCategory::Client | ApiErrorCategory::RateLimit
        )
    }

    /// The message carried by status-derived errors
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::RateLimit(m)
            | Self::Server(m)
            | Self::Client(m)
            | Self::Network(m)
            | Self::Config(m) => Some(m),
            Self::Storage(_) | Self::Timeout(_) => None,
        }
    }

    /// Classify a non-success response
    ///
    /// The message is the server's `error` field when the body carries one,
    /// otherwise `fallback`.
    pub fn from_status(status: StatusCode, body: &str, fallback: impl Into<String>) -> Self {
        let message = ServerErrorBody::parse(body).into_message().unwrap_or_else(|| fallback.into());

        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimit(message),
            s if s.is_server_error() => Self::Server(message),
            s if s.is_client_error() => Self::Client(message),
            _ => Self::Network(message),
        }
    }

    /// Classify a transport failure
    pub fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else if err.is_decode() {
            Self::Client(format!("Failed to parse response: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}
