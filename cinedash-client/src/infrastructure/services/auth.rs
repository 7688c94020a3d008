use async_trait::async_trait;
use cinedash_contracts::{
    auth::{AuthPayload, LoginRequest, RefreshPayload, RefreshRequest},
    routes::admin,
};
use reqwest::Method;

use crate::domains::auth::errors::{AuthError, AuthResult, NetworkError};
use crate::infrastructure::{api_client::ApiClient, errors::ApiError};

const LOGIN_FAILED: &str = "Login failed";
const REFRESH_FAILED: &str = "Token refresh failed";
const VERIFY_FAILED: &str = "Token verification failed";

/// Auth endpoints of the admin REST API
#[async_trait]
pub trait AuthApi: Send + Sync + std::fmt::Debug {
    async fn authenticate(&self, request: &LoginRequest) -> AuthResult<AuthPayload>;

    /// `refresh_token` is sent in the body when held; otherwise the server
    /// relies on its refresh cookie.
    async fn refresh(&self, refresh_token: Option<&str>) -> AuthResult<RefreshPayload>;

    async fn verify(&self, access_token: &str) -> AuthResult<()>;

    async fn logout(&self, access_token: &str) -> AuthResult<()>;
}

/// HTTP implementation over an uncredentialed [`ApiClient`]; bearer tokens
/// are attached explicitly and never retried.
#[derive(Debug, Clone)]
pub struct AuthApiAdapter {
    client: ApiClient,
}

impl AuthApiAdapter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthApi for AuthApiAdapter {
    async fn authenticate(&self, request: &LoginRequest) -> AuthResult<AuthPayload> {
        let builder = self
            .client
            .request(Method::POST, admin::AUTHENTICATE)
            .json(request);
        self.client
            .execute_without_retry(builder)
            .await
            .map_err(|e| into_auth_error(e, LOGIN_FAILED, AuthError::AuthenticationFailed))
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> AuthResult<RefreshPayload> {
        let body = RefreshRequest {
            refresh_token: refresh_token.map(str::to_owned),
        };
        let builder = self.client.request(Method::POST, admin::REFRESH).json(&body);
        self.client
            .execute_without_retry(builder)
            .await
            .map_err(|e| into_auth_error(e, REFRESH_FAILED, AuthError::RefreshFailed))
    }

    async fn verify(&self, access_token: &str) -> AuthResult<()> {
        let builder = self
            .client
            .request(Method::POST, admin::VERIFY)
            .bearer_auth(access_token);
        self.client
            .execute_acknowledged(builder)
            .await
            .map_err(|e| into_auth_error(e, VERIFY_FAILED, AuthError::VerificationFailed))
    }

    async fn logout(&self, access_token: &str) -> AuthResult<()> {
        let builder = self
            .client
            .request(Method::POST, admin::LOGOUT)
            .bearer_auth(access_token);
        self.client
            .execute_acknowledged(builder)
            .await
            .map_err(|e| AuthError::Network(NetworkError::from(e)))
    }
}

/// Server refusals become `rejected(message)`, using the server message when
/// present; transport trouble stays a network error.
fn into_auth_error(
    err: ApiError,
    fallback: &str,
    rejected: fn(String) -> AuthError,
) -> AuthError {
    if err.is_rejection() {
        let message = err
            .server_message()
            .map(str::to_owned)
            .unwrap_or_else(|| fallback.to_string());
        rejected(message)
    } else {
        AuthError::Network(NetworkError::from(err))
    }
}
