use zeroize::Zeroizing;

/// Source of the passphrase used to derive the token store key
///
/// Consulted when the OS keyring is unavailable or disabled.
#[async_trait::async_trait]
pub trait SecretProvider: Send + Sync {
    /// Returns None when no passphrase is available.
    async fn get_passphrase(&self, prompt: &str) -> Option<Zeroizing<String>>;
}

/// Secret provider that never has a passphrase (keyring-only storage)
#[derive(Debug, Clone, Default)]
pub struct NoSecretProvider;

#[async_trait::async_trait]
impl SecretProvider for NoSecretProvider {
    async fn get_passphrase(&self, _prompt: &str) -> Option<Zeroizing<String>> {
        None
    }
}

/// Fixed passphrase, for tests
#[derive(Debug, Clone)]
pub struct StaticSecretProvider {
    secret: String,
}

impl StaticSecretProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait::async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_passphrase(&self, _prompt: &str) -> Option<Zeroizing<String>> {
        Some(Zeroizing::new(self.secret.clone()))
    }
}

/// Reads the passphrase from an environment variable
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    var: String,
}

impl EnvSecretProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait::async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_passphrase(&self, _prompt: &str) -> Option<Zeroizing<String>> {
        std::env::var(&self.var)
            .ok()
            .filter(|value| !value.is_empty())
            .map(Zeroizing::new)
    }
}
