use reqwest::StatusCode;
use thiserror::Error;

use crate::domains::auth::errors::{AuthError, NetworkError};

/// Failure of a single REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unauthorized: {}", message.as_deref().unwrap_or("credential rejected"))]
    Unauthorized { message: Option<String> },

    #[error("request failed with status {status}: {}", message.as_deref().unwrap_or("no details"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("server reported failure: {}", message.as_deref().unwrap_or("no details"))]
    Rejected { message: Option<String> },

    #[error("empty response from server")]
    EmptyResponse,

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{path} was still unauthorized after refreshing the credential")]
    RetryExhausted { path: String },

    #[error("credential refresh failed: {0}")]
    CredentialRefresh(#[from] AuthError),
}

impl ApiError {
    /// Message supplied by the server, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Status { message, .. }
            | ApiError::Rejected { message } => message.as_deref(),
            _ => None,
        }
    }

    /// The server answered and refused; as opposed to transport trouble.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. }
                | ApiError::Status { .. }
                | ApiError::Rejected { .. }
                | ApiError::EmptyResponse
                | ApiError::RetryExhausted { .. }
        )
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. }
            | ApiError::RetryExhausted { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

impl From<ApiError> for NetworkError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) if e.is_timeout() => NetworkError::Timeout,
            ApiError::Decode(e) => NetworkError::InvalidResponse(e.to_string()),
            other => NetworkError::RequestFailed(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
