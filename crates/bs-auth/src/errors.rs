use thiserror::Error;

/// Authentication and token storage error types
#[derive(Error, Debug)]
pub enum AuthError {
    /// Failure reported by the identity provider. Displays as the provider's message only.
    #[error("{message}")]
    Provider {
        status: Option<reqwest::StatusCode>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("No active session")]
    NoSession,

    #[error("Missing refresh token - cannot refresh session")]
    MissingRefreshToken,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Token store is corrupted or was written with a different key")]
    CorruptedStore,

    #[error("Token store is locked by another process")]
    LockTimeout,

    #[error("No passphrase available to unlock the token store")]
    MissingPassphrase,

    #[error("Another session operation is already in flight")]
    OperationInFlight,
}

impl AuthError {
    /// Build a provider failure carrying only a message
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            status: None,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_message_verbatim() {
        let err = AuthError::Provider {
            status: Some(reqwest::StatusCode::BAD_REQUEST),
            message: "Invalid login credentials".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert_eq!(AuthError::provider("bad credentials").to_string(), "bad credentials");
    }
}
