use serde::{Deserialize, Serialize};

/// Standard envelope returned by every admin endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ApiErrors>,
}

/// Nested error detail some endpoints attach to a failed envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            status: None,
            errors: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            status: None,
            errors: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Most specific human-readable error carried by the envelope.
    ///
    /// `errors.message` wins over the top-level `message`; blank strings are
    /// ignored.
    pub fn error_message(&self) -> Option<&str> {
        self.errors
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .or(self.message.as_deref())
            .filter(|m| !m.trim().is_empty())
    }

    /// Consume the envelope, yielding the payload only when the server
    /// reported success.
    pub fn into_data(self) -> Option<T> {
        if self.success { self.data } else { None }
    }
}
