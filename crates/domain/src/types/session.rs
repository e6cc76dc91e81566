//! Session state types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::user::UserProfile;

/// Externally visible authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum AuthState {
    /// Stored credentials have not been loaded yet
    #[default]
    Initializing,
    /// No usable session
    Unauthenticated,
    /// Signed in as the given user
    Authenticated(UserProfile),
}

impl AuthState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Initializing)
    }

    /// The signed-in user, if any
    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Access token plus the refresh token it was issued with
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}
