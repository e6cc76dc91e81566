//! Session token types
//!
//! Defines the claim set carried in access tokens and the slots under which
//! credentials are persisted.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Claims carried in the payload segment of an access token
///
/// Field names follow the backend's token payload (`id`, `email`, `role`,
/// `organization_id`, `iat`, `exp`). Decoding never fails over a claim's
/// type: text claims accept strings, numbers, booleans or `null`, and
/// anything else reads as empty. Timestamps accept integers, floats or
/// numeric strings. A payload without a usable `exp` is treated as already
/// expired by the inspector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier. Accepts both string and numeric ids.
    #[serde(default, alias = "sub", deserialize_with = "lenient_text")]
    pub id: String,

    /// Account email
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: String,

    /// Application role (e.g. "admin", "sales")
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: String,

    /// Tenant organization, if the account belongs to one
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_opt_text")]
    pub organization_id: Option<String>,

    /// Issued-at, seconds since the UNIX epoch
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_seconds")]
    pub iat: Option<i64>,

    /// Expiry, seconds since the UNIX epoch
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_seconds")]
    pub exp: Option<i64>,
}

impl Claims {
    /// Expiry in milliseconds since the epoch, if the token carries one
    #[must_use]
    pub fn exp_millis(&self) -> Option<i64> {
        self.exp.map(|exp| exp.saturating_mul(1000))
    }
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?))
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.floor() as i64),
        _ => None,
    };
    Ok(seconds)
}

/// Durable credential slots
///
/// The three slots are independent keys under one application namespace.
/// Clearing a session removes all of them together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSlot {
    /// Short-lived bearer token attached to outbound requests
    AccessToken,
    /// Longer-lived token exchanged for a new access token
    RefreshToken,
    /// Cached user profile (serialized JSON)
    UserProfile,
}

impl CredentialSlot {
    /// All slots, in the order they are cleared
    pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::UserProfile];

    /// Storage key for this slot
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::UserProfile => "user_profile",
        }
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    #[test]
    fn claims_accept_numeric_subject() {
        let claims: Claims =
            serde_json::from_str(r#"{"id":42,"email":"a@b.c","role":"admin","iat":1,"exp":2}"#)
                .unwrap();

        assert_eq!(claims.id, "42");
        assert_eq!(claims.email, "a@b.c");
        assert_eq!(claims.exp, Some(2));
        assert_eq!(claims.organization_id, None);
    }

    #[test]
    fn claims_accept_sub_alias() {
        let claims: Claims = serde_json::from_str(r#"{"sub":"user-7","exp":10}"#).unwrap();

        assert_eq!(claims.id, "user-7");
        assert_eq!(claims.exp_millis(), Some(10_000));
    }

    #[test]
    fn claims_without_exp_still_decode() {
        let claims: Claims = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert!(claims.exp.is_none());
        assert!(claims.exp_millis().is_none());
    }

    #[test]
    fn claims_tolerate_unexpected_claim_types() {
        let claims: Claims = serde_json::from_str(
            r#"{"id":3,"email":null,"role":null,"organization_id":5,"iat":"100","exp":1700000000.9}"#,
        )
        .unwrap();

        assert_eq!(claims.email, "");
        assert_eq!(claims.role, "");
        assert_eq!(claims.organization_id.as_deref(), Some("5"));
        assert_eq!(claims.iat, Some(100));
        assert_eq!(claims.exp, Some(1_700_000_000));
    }

    #[test]
    fn unusable_exp_reads_as_missing() {
        let claims: Claims = serde_json::from_str(r#"{"id":"1","exp":{"at":5}}"#).unwrap();
        assert!(claims.exp.is_none());
    }

    #[test]
    fn slot_keys_are_stable() {
        assert_eq!(CredentialSlot::AccessToken.key(), "access_token");
        assert_eq!(CredentialSlot::RefreshToken.to_string(), "refresh_token");
        assert_eq!(CredentialSlot::UserProfile.key(), "user_profile");
        assert_eq!(CredentialSlot::ALL.len(), 3);
    }
}
