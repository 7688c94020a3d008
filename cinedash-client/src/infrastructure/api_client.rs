use std::sync::Arc;

use async_trait::async_trait;
use cinedash_config::ApiConfig;
use cinedash_contracts::api_types::ApiResponse;
use log::{debug, info, warn};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use super::errors::{ApiError, ApiResult};
use super::query_cache::QueryCache;
use crate::domains::auth::errors::AuthError;

/// Supplies the bearer credential for outbound calls and recovers it after
/// the server rejects it.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Token to attach right now, if any.
    fn bearer_token(&self) -> Option<String>;

    /// Called after a `401`. Implementations must not refresh again when
    /// the current token already differs from `rejected`.
    async fn refresh_after_rejection(
        &self,
        rejected: Option<&str>,
    ) -> Result<String, AuthError>;
}

/// REST client for the admin API
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Option<Arc<dyn CredentialSource>>,
    cache: Option<Arc<QueryCache>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authorized", &self.credentials.is_some())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl ApiClient {
    /// Create a client without credentials. The cookie jar is enabled so
    /// refresh cookies set by the server are replayed automatically.
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()
            .map_err(ApiError::Client)?;

        info!(
            "[ApiClient] Creating API client with base URL: {}",
            config.base_url
        );

        Ok(Self {
            client,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            credentials: None,
            cache: None,
        })
    }

    /// Same connection pool and cookie jar, with credentials attached.
    pub fn with_credentials(&self, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            credentials: Some(credentials),
            ..self.clone()
        }
    }

    pub fn with_cache(&self, cache: Arc<QueryCache>) -> Self {
        Self {
            cache: Some(cache),
            ..self.clone()
        }
    }

    pub fn build_url(&self, path: impl AsRef<str>) -> String {
        let p = path.as_ref();
        if p.starts_with("http://") || p.starts_with("https://") {
            return p.to_string();
        }
        format!("{}/{}", self.base_url, p.trim_start_matches('/'))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Unauthenticated request builder for `path`.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.build_url(path))
    }

    fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET with credentials and the single retry after a refresh.
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> ApiResult<R> {
        let request = self.request(Method::GET, path);
        self.execute(path, request).await
    }

    /// GET served from the query cache when fresh.
    pub async fn get_cached<R>(&self, path: &str) -> ApiResult<R>
    where
        R: DeserializeOwned + Serialize,
    {
        let Some(cache) = &self.cache else {
            return self.get(path).await;
        };
        if let Some(hit) = cache.get(path) {
            debug!("[ApiClient] cache hit for {path}");
            return serde_json::from_value(hit).map_err(ApiError::Decode);
        }

        let value: R = self.get(path).await?;
        match serde_json::to_value(&value) {
            Ok(json) => cache.insert(path, json),
            Err(err) => warn!("[ApiClient] not caching {path}: {err}"),
        }
        Ok(value)
    }

    /// POST with credentials and the single retry after a refresh.
    pub async fn post<T, R>(&self, path: &str, body: &T) -> ApiResult<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body);
        self.execute(path, request).await
    }

    /// Send with the current bearer; on `401` let the credential source
    /// refresh, then replay exactly once with the token it now holds.
    pub async fn execute<R: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> ApiResult<R> {
        let Some(credentials) = &self.credentials else {
            return self.execute_without_retry(request).await;
        };

        let replay = request.try_clone();
        let sent_with = credentials.bearer_token();
        let response = Self::authorize(request, sent_with.as_deref())
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::read_data(response).await;
        }
        let Some(replay) = replay else {
            warn!("[ApiClient] {path} returned 401 and cannot be replayed");
            return Self::read_data(response).await;
        };

        info!("[ApiClient] {path} returned 401, refreshing credential");
        let refreshed = credentials
            .refresh_after_rejection(sent_with.as_deref())
            .await?;
        // Whatever the source holds now wins over the value it returned.
        let token = credentials.bearer_token().unwrap_or(refreshed);

        let response = Self::authorize(replay, Some(&token)).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("[ApiClient] {path} still unauthorized after refresh");
            return Err(ApiError::RetryExhausted {
                path: path.to_string(),
            });
        }
        Self::read_data(response).await
    }

    /// Send once, decoding the envelope payload. No credential handling.
    pub async fn execute_without_retry<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> ApiResult<R> {
        let response = request.send().await?;
        Self::read_data(response).await
    }

    /// Send once and require a successful envelope; the payload, if any, is
    /// ignored. Empty bodies count as success.
    pub async fn execute_acknowledged(
        &self,
        request: RequestBuilder,
    ) -> ApiResult<()> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = Self::checked_body(response).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        let envelope: ApiResponse<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(ApiError::Decode)?;
        if envelope.success {
            Ok(())
        } else {
            debug!("[ApiClient] {status} with success=false");
            Err(ApiError::Rejected {
                message: envelope.error_message().map(str::to_owned),
            })
        }
    }

    async fn read_data<R: DeserializeOwned>(response: Response) -> ApiResult<R> {
        let bytes = Self::checked_body(response).await?;
        let envelope: ApiResponse<R> =
            serde_json::from_slice(&bytes).map_err(ApiError::Decode)?;
        if !envelope.success {
            return Err(ApiError::Rejected {
                message: envelope.error_message().map(str::to_owned),
            });
        }
        envelope.data.ok_or(ApiError::EmptyResponse)
    }

    /// Body of a 2xx response, or the error the status maps to.
    async fn checked_body(response: Response) -> ApiResult<Vec<u8>> {
        let status = response.status();
        let bytes = response.bytes().await?.to_vec();
        if status.is_success() {
            return Ok(bytes);
        }

        let message = error_message_from_body(&bytes);
        if status == StatusCode::UNAUTHORIZED {
            Err(ApiError::Unauthorized { message })
        } else {
            Err(ApiError::Status { status, message })
        }
    }
}

fn error_message_from_body(bytes: &[u8]) -> Option<String> {
    if let Ok(envelope) =
        serde_json::from_slice::<ApiResponse<serde_json::Value>>(bytes)
        && let Some(message) = envelope.error_message()
    {
        return Some(message.to_string());
    }
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty() && !text.starts_with('{')).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: Url::parse(base).unwrap(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn build_url_joins_base_and_path() {
        let api = client("http://localhost:8080/api/");
        assert_eq!(
            api.build_url("/admin/verify"),
            "http://localhost:8080/api/admin/verify"
        );
        assert_eq!(
            api.build_url("videos/1/stream"),
            "http://localhost:8080/api/videos/1/stream"
        );
        assert_eq!(
            api.build_url("https://cdn.example.com/a.mp4"),
            "https://cdn.example.com/a.mp4"
        );
    }

    #[test]
    fn error_message_prefers_envelope() {
        assert_eq!(
            error_message_from_body(br#"{"success":false,"message":"Invalid credentials"}"#),
            Some("Invalid credentials".to_string())
        );
        assert_eq!(
            error_message_from_body(b"Bad Gateway"),
            Some("Bad Gateway".to_string())
        );
        assert_eq!(error_message_from_body(br#"{"success":false}"#), None);
        assert_eq!(error_message_from_body(b""), None);
    }
}
