//! Token minting for tests
//!
//! Produces `header.payload.signature` strings whose payload is real
//! base64url JSON claims. The signature segment is a fixed placeholder;
//! nothing in the client verifies it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;

use crate::auth::types::Claims;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const SIGNATURE: &str = "dGVzdC1zaWduYXR1cmU";

/// Token for a default test user expiring `exp_offset_secs` from now
///
/// Negative offsets produce an already expired token.
#[must_use]
pub fn mint_token(exp_offset_secs: i64) -> String {
    mint_token_for("1", "user@relaycrm.test", exp_offset_secs)
}

/// Token for a specific subject expiring `exp_offset_secs` from now
#[must_use]
pub fn mint_token_for(id: &str, email: &str, exp_offset_secs: i64) -> String {
    let now = Utc::now().timestamp();
    mint_token_with_claims(&Claims {
        id: id.to_string(),
        email: email.to_string(),
        role: "sales".to_string(),
        organization_id: None,
        iat: Some(now),
        exp: Some(now + exp_offset_secs),
    })
}

/// Token carrying exactly `claims`
#[must_use]
pub fn mint_token_with_claims(claims: &Claims) -> String {
    // Claims only hold strings and integers, so serialization cannot fail.
    let payload = serde_json::to_vec(claims).unwrap_or_default();
    format!(
        "{}.{}.{SIGNATURE}",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    )
}
