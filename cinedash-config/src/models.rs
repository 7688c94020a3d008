use std::{path::PathBuf, time::Duration};

use url::Url;

/// Default REST base; routes are appended verbatim.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_PROFILE: &str = "default";

/// Fully resolved client configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub media: MediaConfig,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn default_base_url() -> Url {
    match Url::parse(DEFAULT_API_BASE_URL) {
        Ok(url) => url,
        Err(_) => unreachable!("default base URL is a valid literal"),
    }
}

/// Session lifecycle timings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How long before token expiry the proactive refresh fires.
    pub refresh_lead: Duration,
    /// Interval of the background verify check; `None` disables it.
    pub verify_interval: Option<Duration>,
    /// Upper bound on the best-effort logout notification.
    pub logout_timeout: Duration,
    pub proactive_refresh: bool,
    /// Persisted state is scoped to this profile name.
    pub profile: String,
    /// Overrides the platform data directory for persisted state.
    pub storage_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_lead: Duration::from_secs(5 * 60),
            verify_interval: Some(Duration::from_secs(5 * 60)),
            logout_timeout: Duration::from_secs(2),
            proactive_refresh: true,
            profile: DEFAULT_PROFILE.to_string(),
            storage_dir: None,
        }
    }
}

/// Signed media URL refresh timings.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaConfig {
    /// Used when the grant carries no parseable expiry, and as the ceiling
    /// otherwise.
    pub fallback_refresh_interval: Duration,
    pub refresh_lead: Duration,
    pub min_refresh_interval: Duration,
    pub preload_timeout: Duration,
    /// Delay before retrying after a failed grant fetch.
    pub failure_retry_delay: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            fallback_refresh_interval: Duration::from_secs(30 * 60),
            refresh_lead: Duration::from_secs(60),
            min_refresh_interval: Duration::from_secs(5),
            preload_timeout: Duration::from_secs(10),
            failure_retry_delay: Duration::from_secs(30),
        }
    }
}
