use cinedash_contracts::auth::{AdminUser, AuthPayload, RefreshPayload};
use serde::{Deserialize, Serialize};

use super::device::DeviceIdentity;

/// The credential held for the signed-in administrator.
///
/// Created on login, mutated in place by each refresh and destroyed on
/// logout or refresh failure.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub role: String,
    pub access_token: String,
    pub session_id: String,
    pub user: AdminUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn from_login(payload: AuthPayload) -> Self {
        Self {
            user_id: payload.user.user_id.clone(),
            role: payload.user.role.clone(),
            access_token: payload.access_token,
            session_id: payload.session_id,
            user: payload.user,
            refresh_token: payload.refresh_token,
        }
    }

    /// Replace the credential with a refreshed one.
    ///
    /// The access token always changes; session id, profile and refresh
    /// token only when the server supplied them.
    pub fn apply_refresh(&mut self, payload: RefreshPayload) {
        self.access_token = payload.access_token;
        if let Some(session_id) =
            payload.session_id.filter(|id| !id.is_empty())
        {
            self.session_id = session_id;
        }
        if let Some(user) = payload.user {
            self.user_id = user.user_id.clone();
            self.role = user.role.clone();
            self.user = user;
        }
        if payload.refresh_token.is_some() {
            self.refresh_token = payload.refresh_token;
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty() && !self.user_id.is_empty()
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("session_id", &self.session_id)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Input to [`SessionManager::login`](super::manager::SessionManager::login).
#[derive(Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
    /// Falls back to the persisted device id, generating one if needed.
    pub device_id: Option<DeviceIdentity>,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            device_id: None,
        }
    }

    pub fn with_device_id(mut self, device_id: DeviceIdentity) -> Self {
        self.device_id = Some(device_id);
        self
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Result of a successful [`verify`](super::manager::SessionManager::verify).
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// The server accepted the current credential.
    Verified,
    /// Verification failed but a refresh recovered the session.
    Refreshed(Session),
}
