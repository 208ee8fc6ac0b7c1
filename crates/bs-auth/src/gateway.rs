use crate::errors::Result;
use crate::models::User;
use crate::tokens::Credentials;

/// Remote identity provider as seen by the session state machine
///
/// Every fallible operation reports the provider's own message through
/// [`AuthError`](crate::AuthError)'s `Display`; callers surface it verbatim.
#[async_trait::async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Register a new account. A session may or may not be established,
    /// depending on whether the provider requires email confirmation.
    async fn sign_up(&self, credentials: &Credentials) -> Result<()>;

    /// Establish a session for an existing account
    async fn sign_in(&self, credentials: &Credentials) -> Result<()>;

    /// Invalidate the remote session and drop the local one
    async fn sign_out(&self) -> Result<()>;

    /// Access token of the in-memory session, if any
    fn current_token(&self) -> Option<String>;

    /// Refresh token of the in-memory session, if any
    fn current_refresh_token(&self) -> Option<String> {
        None
    }

    /// Seed the in-memory session with a refresh token read back from storage
    fn attach_refresh_token(&self, _refresh_token: &str) {}

    /// Adopt an access token read back from storage without validating it,
    /// so a later `sign_out` can revoke it
    fn adopt_token(&self, _access_token: &str) {}

    /// Validate a stored access token and adopt it as the current session
    async fn retrieve_user(&self, token: &str) -> Result<User>;

    /// Exchange the current session for a renewed one
    async fn refresh_session(&self) -> Result<()>;
}
