use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
///
/// Durations are humantime strings (`"5m"`, `"10s"`).
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub api: FileApiConfig,
    #[serde(default)]
    pub session: FileSessionConfig,
    #[serde(default)]
    pub media: FileMediaConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_lead: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proactive_refresh: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMediaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_refresh_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_lead: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_refresh_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preload_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_retry_delay: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub request_timeout: Option<String>,
    pub profile: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub refresh_lead: Option<String>,
    pub verify_interval: Option<String>,
    pub logout_timeout: Option<String>,
    pub proactive_refresh: Option<bool>,
    pub media_fallback_interval: Option<String>,
    pub media_refresh_lead: Option<String>,
    pub media_min_interval: Option<String>,
    pub preload_timeout: Option<String>,
    pub media_retry_delay: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup, so callers can feed values without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };

        Self {
            config_path: var("CINEDASH_CONFIG_PATH").map(PathBuf::from),
            api_url: var("CINEDASH_API_URL"),
            request_timeout: var("CINEDASH_REQUEST_TIMEOUT"),
            profile: var("CINEDASH_PROFILE"),
            storage_dir: var("CINEDASH_STORAGE_DIR").map(PathBuf::from),
            refresh_lead: var("CINEDASH_REFRESH_LEAD"),
            verify_interval: var("CINEDASH_VERIFY_INTERVAL"),
            logout_timeout: var("CINEDASH_LOGOUT_TIMEOUT"),
            proactive_refresh: var("CINEDASH_PROACTIVE_REFRESH")
                .and_then(|raw| parse_bool(&raw)),
            media_fallback_interval: var("CINEDASH_MEDIA_FALLBACK_INTERVAL"),
            media_refresh_lead: var("CINEDASH_MEDIA_REFRESH_LEAD"),
            media_min_interval: var("CINEDASH_MEDIA_MIN_INTERVAL"),
            preload_timeout: var("CINEDASH_PRELOAD_TIMEOUT"),
            media_retry_delay: var("CINEDASH_MEDIA_RETRY_DELAY"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_ignores_blank_values_and_parses_bools() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CINEDASH_API_URL", "https://admin.example.com/api"),
            ("CINEDASH_PROFILE", "   "),
            ("CINEDASH_PROACTIVE_REFRESH", "off"),
        ]);
        let env = EnvConfig::from_lookup(|name| {
            vars.get(name).map(|value| value.to_string())
        });

        assert_eq!(
            env.api_url.as_deref(),
            Some("https://admin.example.com/api")
        );
        assert!(env.profile.is_none());
        assert_eq!(env.proactive_refresh, Some(false));
    }

    #[test]
    fn unknown_bool_is_dropped() {
        let env = EnvConfig::from_lookup(|name| {
            (name == "CINEDASH_PROACTIVE_REFRESH").then(|| "maybe".to_string())
        });
        assert!(env.proactive_refresh.is_none());
    }
}
