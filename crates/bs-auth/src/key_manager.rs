use std::path::Path;
use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::crypto::{self, EncryptionKey};
use crate::errors::{AuthError, Result};
use crate::secret::SecretProvider;

const SALT_LEN: usize = 32;
const META_FILE: &str = "meta.json";
#[cfg(feature = "keyring-support")]
const KEYRING_SERVICE: &str = "bookshelf";
#[cfg(feature = "keyring-support")]
const KEYRING_ENTRY: &str = "bs-auth:token-store:v1";
/// The Linux kernel keyring is in-memory and loses entries on reboot
#[cfg(feature = "keyring-support")]
const KEYRING_PERSISTS: bool = !cfg!(target_os = "linux");

/// Where the token store key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// OS keyring first, passphrase as fallback
    Keyring,
    /// Passphrase only; never touches the keyring
    Passphrase,
}

impl Default for KeySource {
    fn default() -> Self {
        if cfg!(feature = "keyring-support") {
            Self::Keyring
        } else {
            Self::Passphrase
        }
    }
}

/// Key derivation metadata persisted next to the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMeta {
    pub version: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Base64 salt for Argon2id (if a passphrase was ever used)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase_salt: Option<String>,
}

impl Default for KeyMeta {
    fn default() -> Self {
        Self {
            version: 1,
            created_at: chrono::Utc::now(),
            passphrase_salt: None,
        }
    }
}

/// Resolves the token store encryption key
pub struct KeyManager {
    meta: KeyMeta,
    key: EncryptionKey,
}

impl KeyManager {
    pub async fn new(
        storage_dir: &Path,
        secret_provider: Arc<dyn SecretProvider>,
        source: KeySource,
    ) -> Result<Self> {
        let meta_path = storage_dir.join(META_FILE);

        let mut meta = if fs::try_exists(&meta_path).await? {
            let content = fs::read_to_string(&meta_path).await?;
            serde_json::from_str(&content)
                .map_err(|e| AuthError::InvalidResponse(format!("Invalid {}: {}", META_FILE, e)))?
        } else {
            KeyMeta::default()
        };

        let key = match source {
            KeySource::Passphrase => Self::derive_from_passphrase(&mut meta, &secret_provider).await?,
            KeySource::Keyring => Self::resolve_with_keyring(&mut meta, &secret_provider).await?,
        };

        let meta_json = serde_json::to_string_pretty(&meta)?;
        fs::write(&meta_path, meta_json).await?;

        Ok(Self { meta, key })
    }

    pub fn key(&self) -> &EncryptionKey {
        &self.key
    }

    pub fn meta(&self) -> &KeyMeta {
        &self.meta
    }

    #[cfg(feature = "keyring-support")]
    async fn resolve_with_keyring(
        meta: &mut KeyMeta,
        secret_provider: &Arc<dyn SecretProvider>,
    ) -> Result<EncryptionKey> {
        match Self::load_from_keyring() {
            Ok(key) => {
                debug!("Loaded token store key from OS keyring");
                return Ok(key);
            }
            Err(e) => debug!("No usable keyring key ({}), falling back", e),
        }

        let key = match Self::derive_from_passphrase(meta, secret_provider).await {
            Ok(key) => key,
            Err(AuthError::MissingPassphrase) => Self::key_without_passphrase()?,
            Err(e) => return Err(e),
        };

        if let Err(e) = Self::save_to_keyring(&key) {
            // A generated key that cannot be stored would make every token unreadable next run.
            if meta.passphrase_salt.is_none() {
                return Err(e);
            }
            warn!("Failed to save token store key to keyring: {}", e);
        }

        Ok(key)
    }

    /// Fresh random key that will only ever live in the keyring
    #[cfg(feature = "keyring-support")]
    fn key_without_passphrase() -> Result<EncryptionKey> {
        if !KEYRING_PERSISTS {
            warn!("Keyring entries do not survive a reboot on this platform, a passphrase is required");
            return Err(AuthError::MissingPassphrase);
        }
        debug!("No passphrase configured, generating a fresh keyring key");
        EncryptionKey::generate()
    }

    #[cfg(not(feature = "keyring-support"))]
    async fn resolve_with_keyring(
        meta: &mut KeyMeta,
        secret_provider: &Arc<dyn SecretProvider>,
    ) -> Result<EncryptionKey> {
        debug!("Built without keyring support, using passphrase");
        Self::derive_from_passphrase(meta, secret_provider).await
    }

    #[cfg(feature = "keyring-support")]
    fn load_from_keyring() -> Result<EncryptionKey> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY)
            .map_err(|e| AuthError::Keyring(format!("Failed to access keyring: {}", e)))?;

        let key_b64 = entry
            .get_password()
            .map_err(|e| AuthError::Keyring(format!("Failed to read from keyring: {}", e)))?;

        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_b64)
            .map_err(|_| AuthError::CorruptedStore)?;

        let key: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| AuthError::CorruptedStore)?;
        Ok(EncryptionKey::from_bytes(key))
    }

    #[cfg(feature = "keyring-support")]
    fn save_to_keyring(key: &EncryptionKey) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY)
            .map_err(|e| AuthError::Keyring(format!("Failed to access keyring: {}", e)))?;

        let key_b64 = base64::engine::general_purpose::STANDARD.encode(key.as_bytes());
        entry
            .set_password(&key_b64)
            .map_err(|e| AuthError::Keyring(format!("Failed to write to keyring: {}", e)))
    }

    /// Derive the key from a passphrase using Argon2id (m=64MiB, t=3, p=1)
    async fn derive_from_passphrase(
        meta: &mut KeyMeta,
        secret_provider: &Arc<dyn SecretProvider>,
    ) -> Result<EncryptionKey> {
        let passphrase = secret_provider
            .get_passphrase("Enter passphrase for the bookshelf token store")
            .await
            .ok_or(AuthError::MissingPassphrase)?;

        let salt = match meta.passphrase_salt {
            Some(ref salt_b64) => base64::engine::general_purpose::STANDARD
                .decode(salt_b64)
                .map_err(|_| AuthError::CorruptedStore)?,
            None => {
                let mut salt = vec![0u8; SALT_LEN];
                crypto::fill_random(&mut salt)?;
                meta.passphrase_salt = Some(base64::engine::general_purpose::STANDARD.encode(&salt));
                salt
            }
        };

        let params = Params::new(65536, 3, 1, Some(32))
            .map_err(|e| AuthError::Crypto(format!("Invalid Argon2 params: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; 32];
        argon2
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| AuthError::Crypto(format!("Key derivation failed: {}", e)))?;

        Ok(EncryptionKey::from_bytes(key))
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("meta", &self.meta)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
