use serde::{Deserialize, Serialize};

/// Body of `POST /admin/authenticate`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Body of `POST /admin/refresh`. Empty when the refresh credential lives in
/// the cookie jar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminName {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    #[serde(default)]
    pub referrals: u64,
    #[serde(default)]
    pub watch_time: f64,
    #[serde(default)]
    pub earnings: f64,
    #[serde(default)]
    pub task_completed: u64,
}

/// Administrator profile as returned alongside a credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub name: AdminName,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub stats: AdminStats,
}

impl AdminUser {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name.first_name, self.name.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// `data` of a successful authenticate response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub access_token: String,
    pub user: AdminUser,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// `data` of a successful refresh response. Only the access token is
/// guaranteed; absent fields keep their previous values client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AdminUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::ApiResponse;
    use serde_json::json;

    #[test]
    fn authenticate_response_parses() {
        let envelope: ApiResponse<AuthPayload> = serde_json::from_value(json!({
            "status": 200,
            "success": true,
            "message": "Login successful",
            "data": {
                "accessToken": "t1",
                "sessionId": "s1",
                "user": {
                    "userId": "u1",
                    "email": "admin@example.com",
                    "role": "admin",
                    "name": { "firstName": "Ada", "lastName": "Lovelace" },
                    "avatar": "",
                    "stats": { "referrals": 2, "watchTime": 10, "earnings": 0, "taskCompleted": 1 }
                }
            }
        }))
        .unwrap();

        let payload = envelope.into_data().unwrap();
        assert_eq!(payload.access_token, "t1");
        assert_eq!(payload.session_id, "s1");
        assert_eq!(payload.user.user_id, "u1");
        assert_eq!(payload.user.display_name(), "Ada Lovelace");
        assert!(payload.refresh_token.is_none());
    }

    #[test]
    fn refresh_payload_tolerates_missing_profile() {
        let payload: RefreshPayload =
            serde_json::from_value(json!({ "accessToken": "t2" })).unwrap();
        assert_eq!(payload.access_token, "t2");
        assert!(payload.user.is_none());
        assert!(payload.session_id.is_none());
    }

    #[test]
    fn login_request_uses_camel_case_and_redacts_password() {
        let request = LoginRequest {
            email: "a@b.c".into(),
            password: "hunter2".into(),
            device_id: "admin_x_y".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["deviceId"], "admin_x_y");
        assert!(!format!("{request:?}").contains("hunter2"));
    }

    #[test]
    fn empty_refresh_request_serializes_to_empty_object() {
        let value = serde_json::to_value(RefreshRequest::default()).unwrap();
        assert_eq!(value, json!({}));
    }
}
