use std::sync::{PoisonError, RwLock};

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use tracing::{debug, instrument, warn};

use crate::config::{endpoints, grant, SupabaseConfig, DEFAULT_USER_AGENT};
use crate::errors::{AuthError, Result};
use crate::gateway::IdentityGateway;
use crate::models::*;
use crate::tokens::{Credentials, ProviderSession};

/// Identity gateway backed by the Supabase auth REST API
#[derive(Debug)]
pub struct SupabaseGateway {
    config: SupabaseConfig,
    http: Client,
    session: RwLock<Option<ProviderSession>>,
}

impl SupabaseGateway {
    /// Create a new gateway with no active session
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(&config.anon_key)
            .map_err(|e| AuthError::InvalidConfig(format!("anon key is not a valid header: {}", e)))?;
        headers.insert("apikey", apikey);

        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            config,
            http,
            session: RwLock::new(None),
        })
    }

    /// Snapshot of the in-memory session
    pub fn session(&self) -> Option<ProviderSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session(&self, session: Option<ProviderSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Turn a non-success response into a provider error carrying its message
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(ErrorResponse::into_message)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.chars().take(200).collect()
                }
            });

        debug!("Provider rejected request with {}: {}", status, message);
        Err(AuthError::Provider {
            status: Some(status),
            message,
        })
    }

    #[instrument(skip(self, body))]
    async fn token_grant<B: serde::Serialize + ?Sized>(
        &self,
        grant_type: &str,
        body: &B,
    ) -> Result<ProviderSession> {
        let mut url = self.config.endpoint(endpoints::TOKEN)?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.anon_key)
            .json(body)
            .send()
            .await?;

        let session: SessionResponse = Self::check(response).await?.json().await?;
        Ok(session.into())
    }
}

#[async_trait::async_trait]
impl IdentityGateway for SupabaseGateway {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_up(&self, credentials: &Credentials) -> Result<()> {
        let url = self.config.endpoint(endpoints::SIGNUP)?;
        let request = PasswordRequest {
            email: &credentials.email,
            password: credentials.password(),
        };

        debug!("Registering new account");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.anon_key)
            .json(&request)
            .send()
            .await?;

        match Self::check(response).await?.json::<SignUpResponse>().await? {
            SignUpResponse::Session(session) => {
                self.set_session(Some(session.into()));
            }
            SignUpResponse::PendingConfirmation(user) => {
                warn!("Account {} created but awaits email confirmation", user.id);
                self.set_session(None);
            }
        }
        Ok(())
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<()> {
        debug!("Signing in with password");
        let request = PasswordRequest {
            email: &credentials.email,
            password: credentials.password(),
        };
        let session = self.token_grant(grant::PASSWORD, &request).await?;
        self.set_session(Some(session));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session() else {
            debug!("No local session, nothing to revoke remotely");
            return Ok(());
        };

        // The local session is dropped whatever the remote outcome.
        self.set_session(None);

        let url = self.config.endpoint(endpoints::LOGOUT)?;
        debug!("Revoking remote session");
        let response = self
            .http
            .post(url)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn current_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    fn current_refresh_token(&self) -> Option<String> {
        self.session().and_then(|s| s.refresh_token)
    }

    fn attach_refresh_token(&self, refresh_token: &str) {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(session) => session.refresh_token = Some(refresh_token.to_string()),
            None => warn!("No session to attach a refresh token to"),
        }
    }

    fn adopt_token(&self, access_token: &str) {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|s| s.access_token == access_token) {
            return;
        }
        debug!("Adopting stored access token");
        *guard = Some(ProviderSession::from_access_token(access_token));
    }

    #[instrument(skip(self, token))]
    async fn retrieve_user(&self, token: &str) -> Result<User> {
        let url = self.config.endpoint(endpoints::USER)?;
        debug!("Validating stored access token");
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let user: User = Self::check(response).await?.json().await?;

        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(session) if session.access_token == token => {
                session.user = Some(user.clone());
            }
            _ => {
                let mut session = ProviderSession::from_access_token(token);
                session.user = Some(user.clone());
                *guard = Some(session);
            }
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn refresh_session(&self) -> Result<()> {
        let session = self.session().ok_or(AuthError::NoSession)?;
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;

        debug!(expired = session.is_expired(), "Refreshing session");
        let request = RefreshRequest { refresh_token };
        let mut renewed = self.token_grant(grant::REFRESH_TOKEN, &request).await?;
        if renewed.user.is_none() {
            renewed.user = session.user.clone();
        }
        self.set_session(Some(renewed));
        Ok(())
    }
}
