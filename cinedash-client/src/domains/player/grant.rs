//! Signed media access grants
//!
//! A grant pairs a resource with the signed URL the server issued for it.
//! When the URL carries its own expiry (`Expires=<unix>` or the SigV4
//! `X-Amz-Date` + `X-Amz-Expires` pair) the refresh delay is derived from
//! it; otherwise the configured fallback interval applies.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use cinedash_config::MediaConfig;
use url::Url;

use super::errors::MediaResult;

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Clone, PartialEq)]
pub struct MediaAccessGrant {
    pub resource_id: String,
    pub url: Url,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl MediaAccessGrant {
    pub fn new(resource_id: impl Into<String>, url: Url) -> Self {
        Self::issued_at(resource_id, url, Utc::now())
    }

    pub fn issued_at(resource_id: impl Into<String>, url: Url, fetched_at: DateTime<Utc>) -> Self {
        let expires_at = signed_url_expiry(&url);
        Self {
            resource_id: resource_id.into(),
            url,
            fetched_at,
            expires_at,
        }
    }

    /// Time left before the signature lapses, if the URL says.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| (expires_at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// `min(fallback, remaining - lead)` floored at the minimum interval.
    pub fn refresh_delay(&self, now: DateTime<Utc>, config: &MediaConfig) -> Duration {
        let Some(remaining) = self.remaining(now) else {
            return config.fallback_refresh_interval;
        };
        remaining
            .saturating_sub(config.refresh_lead)
            .min(config.fallback_refresh_interval)
            .max(config.min_refresh_interval)
    }
}

/// Expiry embedded in a signed URL's query string.
pub fn signed_url_expiry(url: &Url) -> Option<DateTime<Utc>> {
    let mut expires = None;
    let mut amz_date = None;
    let mut amz_expires = None;

    for (key, value) in url.query_pairs() {
        if key.eq_ignore_ascii_case("Expires") {
            expires = value.parse::<i64>().ok();
        } else if key.eq_ignore_ascii_case("X-Amz-Date") {
            amz_date = NaiveDateTime::parse_from_str(&value, AMZ_DATE_FORMAT)
                .ok()
                .map(|naive| naive.and_utc());
        } else if key.eq_ignore_ascii_case("X-Amz-Expires") {
            amz_expires = value.parse::<i64>().ok();
        }
    }

    if let (Some(signed_at), Some(ttl)) = (amz_date, amz_expires) {
        return TimeDelta::try_seconds(ttl).and_then(|ttl| signed_at.checked_add_signed(ttl));
    }
    expires.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Issues grants for a resource
#[async_trait]
pub trait GrantSource: Send + Sync + std::fmt::Debug {
    async fn fetch_grant(&self, resource_id: &str) -> MediaResult<MediaAccessGrant>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> MediaConfig {
        MediaConfig {
            fallback_refresh_interval: Duration::from_secs(30 * 60),
            refresh_lead: Duration::from_secs(60),
            min_refresh_interval: Duration::from_secs(5),
            ..MediaConfig::default()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn parses_expires_parameter() {
        let url = Url::parse("https://cdn.example.com/v.mp4?Expires=1700000600&Signature=x").unwrap();
        assert_eq!(signed_url_expiry(&url), Some(at(1_700_000_600)));
    }

    #[test]
    fn parses_sigv4_parameters() {
        let url = Url::parse(
            "https://bucket.s3.amazonaws.com/v.mp4?X-Amz-Date=20231114T221320Z&X-Amz-Expires=3600&X-Amz-Signature=abc",
        )
        .unwrap();
        assert_eq!(
            signed_url_expiry(&url),
            Some(Utc.with_ymd_and_hms(2023, 11, 14, 23, 13, 20).unwrap())
        );
    }

    #[test]
    fn unsigned_url_has_no_expiry() {
        let url = Url::parse("https://cdn.example.com/v.mp4?token=abc").unwrap();
        assert_eq!(signed_url_expiry(&url), None);
    }

    #[test]
    fn delay_without_expiry_is_fallback() {
        let grant = MediaAccessGrant::issued_at(
            "v1",
            Url::parse("https://cdn.example.com/v.mp4").unwrap(),
            at(0),
        );
        assert_eq!(grant.refresh_delay(at(0), &config()), Duration::from_secs(1800));
    }

    #[test]
    fn delay_leads_expiry() {
        let grant = MediaAccessGrant::issued_at(
            "v1",
            Url::parse("https://cdn.example.com/v.mp4?Expires=600").unwrap(),
            at(0),
        );
        assert_eq!(grant.refresh_delay(at(0), &config()), Duration::from_secs(540));
    }

    #[test]
    fn delay_is_capped_by_fallback() {
        let grant = MediaAccessGrant::issued_at(
            "v1",
            Url::parse("https://cdn.example.com/v.mp4?Expires=86400").unwrap(),
            at(0),
        );
        assert_eq!(grant.refresh_delay(at(0), &config()), Duration::from_secs(1800));
    }

    #[test]
    fn delay_is_floored_when_nearly_expired() {
        let grant = MediaAccessGrant::issued_at(
            "v1",
            Url::parse("https://cdn.example.com/v.mp4?Expires=30").unwrap(),
            at(0),
        );
        assert_eq!(grant.refresh_delay(at(0), &config()), Duration::from_secs(5));
        assert_eq!(grant.refresh_delay(at(100), &config()), Duration::from_secs(5));
        assert_eq!(grant.remaining(at(100)), Some(Duration::ZERO));
    }
}
