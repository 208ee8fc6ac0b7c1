use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::config::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::errors::{AuthError, Result};
use crate::gateway::IdentityGateway;
use crate::state::{ObserverId, SessionObserver, SessionState, StatePublisher};
use crate::store::TokenStore;
use crate::tokens::Credentials;

/// Confirmation and failure messages published by the state machine
pub mod messages {
    pub const REGISTERED: &str = "Registered successfully!";
    pub const LOGGED_IN: &str = "Logged in successfully!";
    pub const LOGGED_OUT: &str = "Logged out successfully!";
    pub const NOT_LOGGED_IN: &str = "User not logged in!";
    pub const ALREADY_LOGGED_IN: &str = "User already logged in!";
    pub const CANCELLED: &str = "Operation cancelled";
}

/// One in-flight operation. Holds the single-flight permit and settles
/// the machine to `Error` if dropped before reaching a terminal state.
struct Operation<'a> {
    publisher: &'a StatePublisher,
    settled: bool,
    _permit: MutexGuard<'a, ()>,
}

impl Operation<'_> {
    fn publish(&self, state: SessionState) {
        self.publisher.publish(state);
    }

    fn settle(mut self, state: SessionState) -> SessionState {
        self.settled = true;
        self.publisher.publish(state.clone());
        state
    }

    fn succeed(self, message: &str) -> SessionState {
        self.settle(SessionState::Success(message.to_string()))
    }

    fn fail(self, error: AuthError) -> SessionState {
        warn!("Session operation failed: {}", error);
        self.settle(SessionState::Error(error.to_string()))
    }
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Session operation dropped while in flight");
            self.publisher
                .publish(SessionState::Error(messages::CANCELLED.to_string()));
        }
    }
}

/// Session/authentication state machine
///
/// Sequences identity gateway and token store calls and publishes every
/// state transition. At most one operation runs at a time; a call made
/// while another is in flight fails with [`AuthError::OperationInFlight`]
/// without publishing anything. Each successful call returns the terminal
/// state it published.
pub struct SessionMachine {
    gateway: Arc<dyn IdentityGateway>,
    store: Arc<dyn TokenStore>,
    publisher: StatePublisher,
    in_flight: Mutex<()>,
}

impl SessionMachine {
    pub fn new(gateway: Arc<dyn IdentityGateway>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            gateway,
            store,
            publisher: StatePublisher::new(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.publisher.current()
    }

    pub fn observe(&self, observer: Arc<dyn SessionObserver>) -> ObserverId {
        self.publisher.observe(observer)
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.publisher.unobserve(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.publisher.subscribe()
    }

    fn begin(&self) -> Result<Operation<'_>> {
        let permit = self.in_flight.try_lock().map_err(|_| {
            debug!("Rejecting session operation, another one is in flight");
            AuthError::OperationInFlight
        })?;

        let operation = Operation {
            publisher: &self.publisher,
            settled: false,
            _permit: permit,
        };
        operation.publish(SessionState::Loading);
        Ok(operation)
    }

    /// Register a new account and persist its session
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SessionState> {
        let operation = self.begin()?;
        if let Err(e) = self.gateway.sign_up(credentials).await {
            return Ok(operation.fail(e));
        }

        self.persist_current_tokens().await;
        info!("Account registered");
        Ok(operation.succeed(messages::REGISTERED))
    }

    /// Sign in to an existing account and persist its session
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<SessionState> {
        let operation = self.begin()?;
        if let Err(e) = self.gateway.sign_in(credentials).await {
            return Ok(operation.fail(e));
        }

        self.persist_current_tokens().await;
        info!("Signed in");
        Ok(operation.succeed(messages::LOGGED_IN))
    }

    /// Sign out remotely and drop the locally stored tokens
    ///
    /// Local tokens are cleared even when the remote sign-out fails, so a
    /// failed logout still leaves this device signed out.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<SessionState> {
        let operation = self.begin()?;

        // A fresh process knows the session only through the store.
        if self.gateway.current_token().is_none()
            && let Some(token) = self.store.get(ACCESS_TOKEN_KEY).await
            && !token.is_empty()
        {
            self.gateway.adopt_token(&token);
        }

        let outcome = self.gateway.sign_out().await;

        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear stored tokens: {}", e);
        }

        match outcome {
            Ok(()) => {
                info!("Signed out");
                operation.publish(SessionState::Success(messages::LOGGED_OUT.to_string()));
                Ok(operation.settle(SessionState::Idle))
            }
            Err(e) => Ok(operation.fail(e)),
        }
    }

    /// Check for a stored session on launch and renew it if present
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> Result<SessionState> {
        let operation = self.begin()?;

        let token = self
            .store
            .get(ACCESS_TOKEN_KEY)
            .await
            .filter(|token| !token.is_empty());
        let Some(token) = token else {
            debug!("No stored access token");
            return Ok(operation.succeed(messages::NOT_LOGGED_IN));
        };

        if let Err(e) = self.gateway.retrieve_user(&token).await {
            return Ok(operation.fail(e));
        }

        if let Some(refresh_token) = self.store.get(REFRESH_TOKEN_KEY).await {
            self.gateway.attach_refresh_token(&refresh_token);
        }

        if let Err(e) = self.gateway.refresh_session().await {
            return Ok(operation.fail(e));
        }

        self.persist_current_tokens().await;
        info!("Restored stored session");
        Ok(operation.succeed(messages::ALREADY_LOGGED_IN))
    }

    /// Write the gateway's current tokens. Failures are logged, never fatal.
    async fn persist_current_tokens(&self) {
        let Some(access_token) = self.gateway.current_token() else {
            warn!("Provider reported success without a session token, nothing persisted");
            return;
        };

        if let Err(e) = self.store.save(ACCESS_TOKEN_KEY, &access_token).await {
            warn!("Failed to persist access token: {}", e);
        }

        if let Some(refresh_token) = self.gateway.current_refresh_token()
            && let Err(e) = self.store.save(REFRESH_TOKEN_KEY, &refresh_token).await
        {
            warn!("Failed to persist refresh token: {}", e);
        }
    }
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
