//! Access token expiry extraction.
//!
//! Only the payload segment is decoded; the signature is never checked
//! because the client cannot verify it anyway.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenDecodeError {
    #[error("token is not a three-part JWT")]
    NotAJwt,
    #[error("payload is not valid base64url")]
    Encoding,
    #[error("payload is not a JSON object: {0}")]
    Payload(String),
    #[error("payload carries no usable exp claim")]
    MissingExpiry,
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<serde_json::Number>,
}

/// Decode the `exp` claim of a JWT.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, TokenDecodeError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenDecodeError::NotAJwt);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| TokenDecodeError::Encoding)?;
    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| TokenDecodeError::Payload(e.to_string()))?;

    let exp = claims
        .exp
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
        .ok_or(TokenDecodeError::MissingExpiry)?;
    DateTime::from_timestamp(exp, 0).ok_or(TokenDecodeError::MissingExpiry)
}

/// Shortest proactive delay for a token that lives no longer than the lead.
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(5);

/// When the proactive refresh for a token should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSchedule {
    /// Fire after this delay.
    After(Duration),
    /// Already past its expiry.
    Expired,
    /// Expiry is unknown; refresh right away rather than guess a lifetime.
    Undecodable,
}

impl RefreshSchedule {
    pub fn for_token(token: &str, lead: Duration, now: DateTime<Utc>) -> Self {
        match decode_expiry(token) {
            Ok(expiry) => match delay_until(expiry, lead, now) {
                Some(delay) => RefreshSchedule::After(delay),
                None => RefreshSchedule::Expired,
            },
            Err(err) => {
                log::debug!("[SessionManager] cannot read token expiry: {err}");
                RefreshSchedule::Undecodable
            }
        }
    }
}

/// `expiry - lead - now`, or `None` once the token has expired.
///
/// A token whose remaining lifetime is within `lead` fires at half of what
/// is left, never sooner than [`MIN_REFRESH_DELAY`], so a short-lived token
/// issued by a refresh does not immediately trigger the next one.
pub fn delay_until(
    expiry: DateTime<Utc>,
    lead: Duration,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let remaining = (expiry - now).to_std().ok().filter(|d| !d.is_zero())?;
    Some(match remaining.checked_sub(lead) {
        Some(delay) if !delay.is_zero() => delay,
        _ => (remaining / 2).max(MIN_REFRESH_DELAY),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    use serde_json::json;

    fn jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn extracts_exp_claim() {
        let token = jwt(json!({ "sub": "u1", "exp": 1_900_000_000 }));
        let expiry = decode_expiry(&token).unwrap();
        assert_eq!(expiry.timestamp(), 1_900_000_000);
    }

    #[test]
    fn fractional_exp_is_truncated() {
        let token = jwt(json!({ "exp": 1_900_000_000.75 }));
        assert_eq!(decode_expiry(&token).unwrap().timestamp(), 1_900_000_000);
    }

    #[test]
    fn opaque_tokens_are_rejected() {
        assert_eq!(decode_expiry("t1"), Err(TokenDecodeError::NotAJwt));
        assert_eq!(decode_expiry("a.b.c.d"), Err(TokenDecodeError::NotAJwt));
        assert_eq!(decode_expiry("a.!!!.c"), Err(TokenDecodeError::Encoding));
    }

    #[test]
    fn missing_exp_is_an_error() {
        let token = jwt(json!({ "sub": "u1" }));
        assert_eq!(
            decode_expiry(&token),
            Err(TokenDecodeError::MissingExpiry)
        );
    }

    #[test]
    fn delay_subtracts_lead() {
        let now = Utc::now();
        let expiry = now + chrono::Duration::minutes(10);
        let delay = delay_until(expiry, Duration::from_secs(300), now);
        assert_eq!(delay, Some(Duration::from_secs(300)));
    }

    #[test]
    fn short_lived_token_fires_at_half_its_lifetime() {
        let now = Utc::now();
        let expiry = now + chrono::Duration::minutes(2);
        assert_eq!(
            delay_until(expiry, Duration::from_secs(300), now),
            Some(Duration::from_secs(60))
        );
        let expiry = now + chrono::Duration::seconds(4);
        assert_eq!(
            delay_until(expiry, Duration::from_secs(300), now),
            Some(MIN_REFRESH_DELAY)
        );
    }

    #[test]
    fn expired_token_has_no_delay() {
        let now = Utc::now();
        let expired = now - chrono::Duration::minutes(2);
        assert_eq!(delay_until(expired, Duration::from_secs(300), now), None);
        assert_eq!(delay_until(now, Duration::from_secs(300), now), None);
    }

    #[test]
    fn schedule_for_opaque_token_is_undecodable() {
        assert_eq!(
            RefreshSchedule::for_token("t1", Duration::from_secs(300), Utc::now()),
            RefreshSchedule::Undecodable
        );
    }
}
