use serde::{Deserialize, Serialize};

/// Email/password body for the signup and password grant endpoints
#[derive(Debug, Clone, Serialize)]
pub struct PasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body for the refresh_token grant
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Session returned by the token endpoint (and by signup when auto-confirm is on)
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Signup answers with a session, or with the bare user while email confirmation is pending
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(SessionResponse),
    PendingConfirmation(User),
}

/// Identity provider user record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Error body. GoTrue has used several shapes across versions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Most specific human-readable message in the body
    pub fn into_message(self) -> Option<String> {
        [self.msg, self.error_description, self.message, self.error]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_msg_then_description() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"code":400,"msg":"User already registered"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("User already registered"));

        let body: ErrorResponse = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));

        let body: ErrorResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(body.into_message(), None);
    }

    #[test]
    fn signup_without_session_is_pending_confirmation() {
        let body = r#"{"id":"u-1","email":"reader@example.com","created_at":"2024-01-01T00:00:00Z"}"#;
        let parsed: SignUpResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(parsed, SignUpResponse::PendingConfirmation(user) if user.id == "u-1"));

        let body = r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,"user":{"id":"u-1"}}"#;
        let parsed: SignUpResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(parsed, SignUpResponse::Session(s) if s.access_token == "at"));
    }
}
