use std::fmt;

use thiserror::Error;

use crate::models::ClientConfig;

/// Hard failures: the configuration cannot be used as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error(
        "media.min_refresh_interval ({min:?}) exceeds media.fallback_refresh_interval ({fallback:?})"
    )]
    MinIntervalAboveFallback {
        min: std::time::Duration,
        fallback: std::time::Duration,
    },
    #[error("unsupported API URL scheme '{scheme}' (expected http or https)")]
    UnsupportedScheme { scheme: String },
    #[error("profile name '{profile}' must be non-empty ASCII letters, digits, '-' or '_'")]
    InvalidProfile { profile: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Soft findings collected while composing the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push(&mut self, message: impl Into<String>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint(
        &mut self,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn validate(
    config: &ClientConfig,
    warnings: &mut ConfigWarnings,
) -> Result<(), ConfigGuardRailError> {
    let scheme = config.api.base_url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ConfigGuardRailError::UnsupportedScheme {
            scheme: scheme.to_string(),
        });
    }
    if scheme == "http" && !is_loopback(&config.api.base_url) {
        warnings.push_with_hint(
            format!(
                "API base URL {} is not TLS protected; credentials travel in plaintext",
                config.api.base_url
            ),
            "use an https:// URL outside local development",
        );
    }

    let non_zero = [
        ("api.request_timeout", config.api.request_timeout),
        ("session.refresh_lead", config.session.refresh_lead),
        ("session.logout_timeout", config.session.logout_timeout),
        ("media.fallback_refresh_interval", config.media.fallback_refresh_interval),
        ("media.min_refresh_interval", config.media.min_refresh_interval),
        ("media.preload_timeout", config.media.preload_timeout),
        ("media.failure_retry_delay", config.media.failure_retry_delay),
    ];
    for (field, value) in non_zero {
        if value.is_zero() {
            return Err(ConfigGuardRailError::ZeroDuration { field });
        }
    }
    if config.session.verify_interval.is_some_and(|d| d.is_zero()) {
        return Err(ConfigGuardRailError::ZeroDuration {
            field: "session.verify_interval",
        });
    }

    if config.media.min_refresh_interval > config.media.fallback_refresh_interval
    {
        return Err(ConfigGuardRailError::MinIntervalAboveFallback {
            min: config.media.min_refresh_interval,
            fallback: config.media.fallback_refresh_interval,
        });
    }

    let profile = &config.session.profile;
    let profile_ok = !profile.is_empty()
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !profile_ok {
        return Err(ConfigGuardRailError::InvalidProfile {
            profile: profile.clone(),
        });
    }

    if !config.session.proactive_refresh
        && config.session.verify_interval.is_none()
    {
        warnings.push(
            "proactive refresh and periodic verify are both disabled; expired sessions surface only on the next request",
        );
    }

    Ok(())
}

fn is_loopback(url: &url::Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
