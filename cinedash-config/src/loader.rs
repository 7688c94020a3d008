use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

use super::{
    models::{ApiConfig, ClientConfig, MediaConfig, SessionConfig},
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["cinedash.toml", "config/cinedash.toml"];

/// Values that switch the background verify loop off.
const DISABLED_VALUES: [&str; 4] = ["off", "disabled", "none", "0"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

/// Loaded configuration plus the soft findings produced on the way.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: ClientConfig,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load the env file (if any), gather `CINEDASH_*` variables and compose
    /// the final configuration.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };
        if env_file_loaded {
            log::debug!("[Config] environment file loaded");
        }

        self.load_with_env(EnvConfig::gather())
    }

    /// Compose from an explicit environment snapshot. The process
    /// environment is not consulted.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let mut warnings = ConfigWarnings::default();
        let config =
            compose_config(file_config, env, config_path, &mut warnings)?;
        validation::validate(&config, &mut warnings)?;

        for warning in warnings.iter() {
            log::warn!("[Config] {warning}");
        }

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .map(PathBuf::from)
                    .find(|candidate| candidate.exists()),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        log::debug!("[Config] loaded {}", path.display());
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
    warnings: &mut ConfigWarnings,
) -> Result<ClientConfig, ConfigLoadError> {
    if config_path.is_none() {
        warnings.push_with_hint(
            "No cinedash.toml detected; using defaults and environment variables",
            "set CINEDASH_CONFIG_PATH to point at a configuration file",
        );
    }

    let FileConfig {
        api: file_api,
        session: file_session,
        media: file_media,
    } = file_config.unwrap_or_default();

    let api_defaults = ApiConfig::default();
    let base_url = match env.api_url.or(file_api.base_url) {
        Some(raw) => parse_base_url(&raw)?,
        None => api_defaults.base_url,
    };
    let api = ApiConfig {
        base_url,
        request_timeout: duration(
            "api.request_timeout",
            env.request_timeout.or(file_api.request_timeout),
            api_defaults.request_timeout,
        )?,
    };

    let session_defaults = SessionConfig::default();
    let verify_interval =
        match env.verify_interval.or(file_session.verify_interval) {
            Some(raw)
                if DISABLED_VALUES
                    .contains(&raw.trim().to_ascii_lowercase().as_str()) =>
            {
                None
            }
            Some(raw) => Some(parse_duration("session.verify_interval", &raw)?),
            None => session_defaults.verify_interval,
        };
    let session = SessionConfig {
        refresh_lead: duration(
            "session.refresh_lead",
            env.refresh_lead.or(file_session.refresh_lead),
            session_defaults.refresh_lead,
        )?,
        verify_interval,
        logout_timeout: duration(
            "session.logout_timeout",
            env.logout_timeout.or(file_session.logout_timeout),
            session_defaults.logout_timeout,
        )?,
        proactive_refresh: env
            .proactive_refresh
            .or(file_session.proactive_refresh)
            .unwrap_or(session_defaults.proactive_refresh),
        profile: env
            .profile
            .or(file_session.profile)
            .unwrap_or(session_defaults.profile),
        storage_dir: env.storage_dir.or(file_session.storage_dir),
    };

    let media_defaults = MediaConfig::default();
    let media = MediaConfig {
        fallback_refresh_interval: duration(
            "media.fallback_refresh_interval",
            env.media_fallback_interval
                .or(file_media.fallback_refresh_interval),
            media_defaults.fallback_refresh_interval,
        )?,
        refresh_lead: duration(
            "media.refresh_lead",
            env.media_refresh_lead.or(file_media.refresh_lead),
            media_defaults.refresh_lead,
        )?,
        min_refresh_interval: duration(
            "media.min_refresh_interval",
            env.media_min_interval.or(file_media.min_refresh_interval),
            media_defaults.min_refresh_interval,
        )?,
        preload_timeout: duration(
            "media.preload_timeout",
            env.preload_timeout.or(file_media.preload_timeout),
            media_defaults.preload_timeout,
        )?,
        failure_retry_delay: duration(
            "media.failure_retry_delay",
            env.media_retry_delay.or(file_media.failure_retry_delay),
            media_defaults.failure_retry_delay,
        )?,
    };

    Ok(ClientConfig {
        api,
        session,
        media,
        config_path,
    })
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigLoadError> {
    Url::parse(raw.trim()).map_err(|source| ConfigLoadError::InvalidUrl {
        value: raw.to_string(),
        source,
    })
}

fn duration(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(raw) => parse_duration(field, &raw),
        None => Ok(default),
    }
}

fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            field,
            value: raw.to_string(),
            source,
        }
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid API base URL '{value}'")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid duration '{value}' for {field}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
