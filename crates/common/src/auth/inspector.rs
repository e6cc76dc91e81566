//! Token inspection without verification
//!
//! Decodes the claims segment of a `header.payload.signature` token and
//! answers expiry questions about it. These functions are pure: no network,
//! no storage, no panics. A token that cannot be decoded is treated as
//! already expired.
//!
//! **Untrusted local hint only.** No signature is checked here, so the
//! results are only good for deciding *when* to renew. Authorization stays
//! with the server.
//!
//! Each time-dependent function has an `_at` variant that takes the current
//! time explicitly.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};

use super::types::Claims;

/// Padding is optional on the way in; tokens normally omit it.
const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Decode the claims of a token without verifying it
///
/// Returns `None` when the token does not have exactly three segments, when
/// the payload is not base64url, or when it is not a JSON claim object.
#[must_use]
pub fn decode(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return None;
    };

    let bytes = URL_SAFE_LENIENT.decode(payload).or_else(|_| STANDARD_LENIENT.decode(payload)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Structural check: exactly three non-empty dot-separated segments
///
/// This says nothing about the signature.
#[must_use]
pub fn is_well_formed(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3 && segments.iter().all(|segment| !segment.is_empty())
}

/// Whether the token is expired (or undecodable) right now
#[must_use]
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Whether the token is expired (or undecodable) at `now`
#[must_use]
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match exp_millis(token) {
        Some(exp_ms) => now.timestamp_millis() >= exp_ms,
        None => true,
    }
}

/// Whether less than `buffer_seconds` remain before expiry
#[must_use]
pub fn is_expiring_soon(token: &str, buffer_seconds: u64) -> bool {
    is_expiring_soon_at(token, buffer_seconds, Utc::now())
}

/// Whether less than `buffer_seconds` remain before expiry at `now`
#[must_use]
pub fn is_expiring_soon_at(token: &str, buffer_seconds: u64, now: DateTime<Utc>) -> bool {
    let Some(exp_ms) = exp_millis(token) else {
        return true;
    };
    let buffer_ms = i64::try_from(buffer_seconds).unwrap_or(i64::MAX).saturating_mul(1000);
    exp_ms.saturating_sub(now.timestamp_millis()) < buffer_ms
}

/// Whole seconds left before expiry, floored at zero
#[must_use]
pub fn remaining_seconds(token: &str) -> u64 {
    remaining_seconds_at(token, Utc::now())
}

/// Whole seconds left before expiry at `now`, floored at zero
#[must_use]
pub fn remaining_seconds_at(token: &str, now: DateTime<Utc>) -> u64 {
    exp_millis(token)
        .map(|exp_ms| exp_ms.saturating_sub(now.timestamp_millis()).max(0) / 1000)
        .and_then(|secs| u64::try_from(secs).ok())
        .unwrap_or(0)
}

/// Absolute expiry of the token, if it carries one
#[must_use]
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp = decode(token)?.exp?;
    Utc.timestamp_opt(exp, 0).single()
}

/// Human-readable time to expiry ("2d 3h", "4h 5m", "6m 7s", "8s", "Expired")
#[must_use]
pub fn format_remaining(token: &str) -> String {
    format_remaining_at(token, Utc::now())
}

/// Human-readable time to expiry at `now`
#[must_use]
pub fn format_remaining_at(token: &str, now: DateTime<Utc>) -> String {
    let seconds = remaining_seconds_at(token, now);
    if seconds == 0 {
        return "Expired".to_string();
    }

    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d {}h", hours % 24)
    } else if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

fn exp_millis(token: &str) -> Option<i64> {
    decode(token)?.exp_millis()
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::inspector.
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use chrono::Duration;

    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.c2lnbmF0dXJl", URL_SAFE_NO_PAD.encode(payload))
    }

    fn token_expiring(now: DateTime<Utc>, offset_secs: i64) -> String {
        let iat = now.timestamp() - 60;
        let exp = now.timestamp() + offset_secs;
        token_with_payload(&format!(
            r#"{{"id":"7","email":"ops@relaycrm.test","role":"admin","iat":{iat},"exp":{exp}}}"#
        ))
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    #[test]
    fn decode_reads_claims() {
        let now = fixed_now();
        let claims = decode(&token_expiring(now, 900)).unwrap();

        assert_eq!(claims.id, "7");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp, Some(now.timestamp() + 900));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn decode_accepts_padded_and_standard_alphabet_payloads() {
        let payload = r#"{"id":"1","exp":4102444800}"#;
        let padded = format!("h.{}.s", STANDARD.encode(payload));

        assert_eq!(decode(&padded).and_then(|c| c.exp), Some(4_102_444_800));
    }

    #[test]
    fn decode_rejects_structural_failures() {
        assert!(decode("").is_none());
        assert!(decode("only-one-segment").is_none());
        assert!(decode("two.segments").is_none());
        assert!(decode("a.b.c.d").is_none());
        assert!(decode("header.!!!not-base64!!!.sig").is_none());
        assert!(decode(&format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json"))).is_none());
        assert!(decode(&format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2,3]"))).is_none());
    }

    #[test]
    fn malformed_tokens_count_as_expired() {
        let now = fixed_now();
        for token in ["", "garbage", "a.b", "a.%%%.c", "a.b.c.d"] {
            assert!(is_expired_at(token, now), "{token:?} should be expired");
            assert!(is_expiring_soon_at(token, 0, now));
            assert_eq!(remaining_seconds_at(token, now), 0);
            assert_eq!(format_remaining_at(token, now), "Expired");
        }
    }

    #[test]
    fn payload_without_exp_is_expired() {
        let token = token_with_payload(r#"{"id":"1","email":"x@y.z"}"#);
        assert!(decode(&token).is_some());
        assert!(is_expired(&token));
        assert!(expires_at(&token).is_none());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = fixed_now();
        let token = token_expiring(now, 0);

        assert!(!is_expired_at(&token, now - Duration::milliseconds(1)));
        assert!(is_expired_at(&token, now));
        assert!(is_expired_at(&token, now + Duration::seconds(1)));
    }

    #[test]
    fn already_expired_token_has_no_time_left() {
        let now = fixed_now();
        let token = token_expiring(now, -10);

        assert!(is_expired_at(&token, now));
        assert_eq!(remaining_seconds_at(&token, now), 0);
    }

    #[test]
    fn expiring_soon_respects_buffer() {
        let now = fixed_now();
        let token = token_expiring(now, 60);

        assert!(is_expiring_soon_at(&token, 300, now));
        assert!(!is_expiring_soon_at(&token, 30, now));
        // Exactly at the buffer edge there is not *less* than the buffer left.
        assert!(!is_expiring_soon_at(&token, 60, now));
    }

    #[test]
    fn remaining_seconds_floors() {
        let now = fixed_now();
        let token = token_expiring(now, 90);

        assert_eq!(remaining_seconds_at(&token, now), 90);
        assert_eq!(remaining_seconds_at(&token, now + Duration::milliseconds(500)), 89);
    }

    #[test]
    fn well_formed_is_structural_only() {
        assert!(is_well_formed("a.b.c"));
        assert!(is_well_formed(&token_with_payload("not even json")));
        assert!(!is_well_formed("a..c"));
        assert!(!is_well_formed(".b.c"));
        assert!(!is_well_formed("a.b"));
        assert!(!is_well_formed("a.b.c.d"));
    }

    #[test]
    fn expires_at_matches_claim() {
        let now = fixed_now();
        let token = token_expiring(now, 3600);

        assert_eq!(expires_at(&token), Some(now + Duration::seconds(3600)));
    }

    #[test]
    fn format_remaining_picks_largest_units() {
        let now = fixed_now();

        assert_eq!(format_remaining_at(&token_expiring(now, 45), now), "45s");
        assert_eq!(format_remaining_at(&token_expiring(now, 125), now), "2m 5s");
        assert_eq!(format_remaining_at(&token_expiring(now, 3 * 3600 + 120), now), "3h 2m");
        assert_eq!(format_remaining_at(&token_expiring(now, 2 * 86_400 + 5 * 3600), now), "2d 5h");
    }
}
