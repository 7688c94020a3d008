//! Session error types
//!
//! `AuthError` is `Clone` so a single refresh outcome can be handed to every
//! caller waiting on it.

use std::sync::Arc;

use thiserror::Error;

/// Main session error type
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Login was rejected; carries the server message or a generic fallback
    #[error("{0}")]
    AuthenticationFailed(String),

    /// Refresh failed and the session has been cleared
    #[error("{0}")]
    RefreshFailed(String),

    /// Verification rejected the current credential
    #[error("{0}")]
    VerificationFailed(String),

    /// Operation requires a session and none is held
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session was replaced or ended while the operation was in flight
    #[error("Session ended while the request was in flight")]
    SessionEnded,

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// True when the server (not the transport) rejected the credential.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::AuthenticationFailed(_)
                | AuthError::RefreshFailed(_)
                | AuthError::VerificationFailed(_)
        )
    }
}

/// Network-related errors
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Connection timeout")]
    Timeout,
}

/// Storage-related errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Failed to initialize storage: {0}")]
    InitFailed(String),

    #[error("Failed to read from storage")]
    ReadFailed(#[source] Arc<std::io::Error>),

    #[error("Failed to write to storage")]
    WriteFailed(#[source] Arc<std::io::Error>),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Corrupted storage data: {0}")]
    CorruptedData(String),
}

/// Result type alias for session operations
pub type AuthResult<T> = Result<T, AuthError>;
