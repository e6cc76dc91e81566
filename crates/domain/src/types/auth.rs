//! Auth endpoint bodies
//!
//! Request bodies redact secrets from their `Debug` output.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

use super::user::UserProfile;

/// `POST /auth/login`
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `POST /auth/register`
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// Successful login or registration
///
/// The access token arrives as `token`, `accessToken`, or both; `token` wins
/// when both are present. Older servers omit the refresh token.
#[derive(Clone)]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user: UserProfile,
}

#[derive(Deserialize)]
struct AuthResponseWire {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "accessToken")]
    access_token: Option<String>,
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
    user: UserProfile,
}

impl<'de> Deserialize<'de> for AuthResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = AuthResponseWire::deserialize(deserializer)?;
        Ok(Self {
            token: pick_access_token(wire.token, wire.access_token)?,
            refresh_token: wire.refresh_token,
            user: wire.user,
        })
    }
}

fn pick_access_token<E: de::Error>(
    token: Option<String>,
    access_token: Option<String>,
) -> Result<String, E> {
    token
        .into_iter()
        .chain(access_token)
        .find(|t| !t.is_empty())
        .ok_or_else(|| E::custom("missing field `token` or `accessToken`"))
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// `POST /auth/refresh`
#[derive(Clone, Serialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshRequest { .. }")
    }
}

/// Successful refresh; a present `refreshToken` means the server rotated it
#[derive(Clone)]
pub struct RefreshResponse {
    pub token: String,
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponseWire {
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "accessToken")]
    access_token: Option<String>,
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
}

impl<'de> Deserialize<'de> for RefreshResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = RefreshResponseWire::deserialize(deserializer)?;
        Ok(Self {
            token: pick_access_token(wire.token, wire.access_token)?,
            refresh_token: wire.refresh_token,
        })
    }
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("rotated", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// `POST /auth/change-password`
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangePasswordRequest { .. }")
    }
}

/// Plain acknowledgement body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Error body the backend sends with 4xx/5xx responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServerErrorBody {
    /// Parse an error body; anything unparseable yields an empty body
    #[must_use]
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// The server's message, preferring `error` over `message`
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.trim().is_empty())
    }
}
