use std::time::Duration;
use url::Url;

use crate::errors::{AuthError, Result};

/// Supabase auth endpoints, relative to the project URL
pub mod endpoints {
    pub const SIGNUP: &str = "auth/v1/signup";
    pub const TOKEN: &str = "auth/v1/token";
    pub const LOGOUT: &str = "auth/v1/logout";
    pub const USER: &str = "auth/v1/user";
}

/// Grant types accepted by the token endpoint
pub mod grant {
    pub const PASSWORD: &str = "password";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Token store key holding the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Token store key holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Time skew for token expiration (treat tokens as expired 60 seconds early)
pub const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Buffered transitions per async subscriber before it starts lagging
pub const STATE_CHANNEL_CAPACITY: usize = 64;

pub const DEFAULT_USER_AGENT: &str = "bookshelf";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Configuration for SupabaseGateway
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, always normalized to end with `/`
    pub project_url: Url,

    /// Public anon key sent as the `apikey` header
    pub anon_key: String,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,
}

impl SupabaseConfig {
    /// Create config for a Supabase project
    pub fn new(project_url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let anon_key = anon_key.into();
        if anon_key.trim().is_empty() {
            return Err(AuthError::InvalidConfig("anon key must not be empty".to_string()));
        }

        let mut project_url = Url::parse(project_url)?;
        if !project_url.path().ends_with('/') {
            let path = format!("{}/", project_url.path());
            project_url.set_path(&path);
        }

        Ok(Self {
            project_url,
            anon_key,
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        })
    }

    pub fn with_timeouts(mut self, http_timeouts: HttpTimeouts) -> Self {
        self.http_timeouts = http_timeouts;
        self
    }

    /// Resolve an endpoint path against the project URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.project_url.join(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_url_is_normalized() {
        let config = SupabaseConfig::new("https://demo.supabase.co", "anon").unwrap();
        assert_eq!(
            config.endpoint(endpoints::USER).unwrap().as_str(),
            "https://demo.supabase.co/auth/v1/user"
        );

        let nested = SupabaseConfig::new("http://localhost:54321/proxy", "anon").unwrap();
        assert_eq!(
            nested.endpoint(endpoints::TOKEN).unwrap().as_str(),
            "http://localhost:54321/proxy/auth/v1/token"
        );
    }

    #[test]
    fn empty_anon_key_is_rejected() {
        let result = SupabaseConfig::new("https://demo.supabase.co", "  ");
        assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
    }
}
