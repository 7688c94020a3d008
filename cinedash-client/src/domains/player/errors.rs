use std::time::Duration;

use thiserror::Error;

/// Media session errors
///
/// Preload failures are recovered inside the controller and only show up in
/// logs; callers see grant failures, element failures and busy rejections.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("media grant refresh failed: {0}")]
    GrantRefreshFailed(String),

    #[error("preload did not become ready within {0:?}")]
    PreloadTimeout(Duration),

    #[error("preload failed: {0}")]
    PreloadFailed(String),

    #[error("media element error: {0}")]
    Element(String),

    #[error("no resource is mounted")]
    NotMounted,

    #[error("a media refresh is in progress")]
    Busy,
}

pub type MediaResult<T> = Result<T, MediaError>;
