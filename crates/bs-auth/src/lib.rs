//! Session and authentication state for the bookshelf application
//!
//! This crate turns asynchronous identity-provider calls (sign-up, login,
//! logout, session restore) into a small set of observable states, and
//! persists the session token across application restarts.
//!
//! # Components
//!
//! 1. [`TokenStore`]: durable key-value storage for token strings
//! 2. [`IdentityGateway`]: the remote identity provider ([`SupabaseGateway`])
//! 3. [`SessionMachine`]: sequences gateway and store calls, publishes [`SessionState`]
//! 4. [`SessionObserver`]: passive readers notified on every transition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bs_auth::{
//!     Credentials, EnvSecretProvider, FileTokenStore, SessionMachine, SessionState,
//!     SupabaseConfig, SupabaseGateway,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SupabaseConfig::new("https://project.supabase.co", "public-anon-key")?;
//!     let gateway = Arc::new(SupabaseGateway::new(config)?);
//!
//!     let secrets = Arc::new(EnvSecretProvider::new("BOOKSHELF_PASSPHRASE"));
//!     let store = FileTokenStore::new(FileTokenStore::default_storage_dir()?, secrets).await?;
//!
//!     let machine = SessionMachine::new(gateway, Arc::new(store));
//!     machine.observe(Arc::new(|state: &SessionState| println!("{}", state)));
//!
//!     // On launch, check for a stored session
//!     machine.restore_session().await?;
//!
//!     // Otherwise sign in
//!     let credentials = Credentials::new("reader@example.com", "password");
//!     if let SessionState::Error(reason) = machine.login(&credentials).await? {
//!         eprintln!("Login failed: {}", reason);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Token Storage
//!
//! ## In-Memory Storage (Testing)
//!
//! ```
//! use bs_auth::{MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = MemoryTokenStore::new();
//! store.save(ACCESS_TOKEN_KEY, "token").await?;
//! assert_eq!(store.get(ACCESS_TOKEN_KEY).await.as_deref(), Some("token"));
//!
//! store.clear().await?;
//! assert_eq!(store.get(ACCESS_TOKEN_KEY).await, None);
//! # Ok(())
//! # }
//! # tokio_test::block_on(example()).unwrap();
//! ```
//!
//! ## File-Based Encrypted Storage (Production)
//!
//! [`FileTokenStore`] encrypts each value with AES-256-GCM. The key lives in
//! the OS keyring (macOS Keychain, Windows Credential Manager, Linux kernel
//! keyring) or is derived from a passphrase with Argon2id.
//!
//! # Important Notes
//!
//! - State transitions are published synchronously and in order; logout
//!   publishes `Success` and then `Idle`
//! - Only one session operation runs at a time; overlapping calls fail with
//!   [`AuthError::OperationInFlight`]
//! - Token persistence failures are logged and never fail an operation
//! - Tokens and passwords are never logged

pub mod config;
pub mod crypto;
pub mod errors;
pub mod file_store;
pub mod gateway;
pub mod key_manager;
pub mod models;
pub mod secret;
pub mod session;
pub mod state;
pub mod store;
pub mod supabase;
pub mod tokens;

// Re-export main types
pub use config::{HttpTimeouts, SupabaseConfig, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
pub use errors::{AuthError, Result};
pub use file_store::FileTokenStore;
pub use gateway::IdentityGateway;
pub use key_manager::KeySource;
pub use models::User;
pub use secret::{EnvSecretProvider, NoSecretProvider, SecretProvider, StaticSecretProvider};
pub use session::{messages, SessionMachine};
pub use state::{ObserverId, SessionObserver, SessionState, StatePublisher};
pub use store::{MemoryTokenStore, TokenStore};
pub use supabase::SupabaseGateway;
pub use tokens::{Credentials, ProviderSession};
