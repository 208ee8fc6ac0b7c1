use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument};

use crate::crypto::{self, EncryptedBlob};
use crate::errors::{AuthError, Result};
use crate::key_manager::{KeyManager, KeySource};
use crate::secret::SecretProvider;
use crate::store::TokenStore;

/// File-based encrypted token store
///
/// Each key is stored as its own AES-256-GCM encrypted file. The key name is
/// bound into the additional authenticated data, so a file copied under
/// another name fails to decrypt.
///
/// # Directory Structure
/// ```text
/// ~/.config/bookshelf/bs-auth/
/// ├── meta.json              # Key derivation metadata
/// ├── lock                   # Advisory lock file
/// └── tokens/
///     ├── accessToken.json
///     └── refreshToken.json
/// ```
#[derive(Debug)]
pub struct FileTokenStore {
    tokens_dir: PathBuf,
    lock_file: PathBuf,
    key_manager: KeyManager,
    /// Values already read or written by this process
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl FileTokenStore {
    /// Open (or create) a store, resolving the key from the OS keyring with passphrase fallback
    pub async fn new(
        storage_dir: impl AsRef<Path>,
        secret_provider: Arc<dyn SecretProvider>,
    ) -> Result<Self> {
        Self::with_key_source(storage_dir, secret_provider, KeySource::default()).await
    }

    pub async fn with_key_source(
        storage_dir: impl AsRef<Path>,
        secret_provider: Arc<dyn SecretProvider>,
        source: KeySource,
    ) -> Result<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        let tokens_dir = storage_dir.join("tokens");
        let lock_file = storage_dir.join("lock");

        fs::create_dir_all(&tokens_dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            fs::set_permissions(&storage_dir, perms.clone()).await?;
            fs::set_permissions(&tokens_dir, perms).await?;
        }

        let key_manager = KeyManager::new(&storage_dir, secret_provider, source).await?;
        debug!("Opened token store at {}", storage_dir.display());

        Ok(Self {
            tokens_dir,
            lock_file,
            key_manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Default storage directory for the current platform
    pub fn default_storage_dir() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "bookshelf").ok_or_else(|| {
            AuthError::InvalidConfig("Could not determine config directory".to_string())
        })?;

        Ok(project_dirs.config_dir().join("bs-auth"))
    }

    fn token_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AuthError::InvalidConfig(format!("Invalid token key: {:?}", key)));
        }
        Ok(self.tokens_dir.join(format!("{}.json", key)))
    }

    /// Exclusive advisory lock, released when the returned file is dropped
    async fn acquire_lock(&self) -> Result<std::fs::File> {
        let lock_path = self.lock_file.clone();
        tokio::task::spawn_blocking(move || -> Result<std::fs::File> {
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;

            lock_file
                .try_lock_exclusive()
                .map_err(|_| AuthError::LockTimeout)?;

            Ok(lock_file)
        })
        .await
        .map_err(|e| AuthError::Io(std::io::Error::other(format!("Lock task failed: {}", e))))?
    }

    async fn load_from_disk(&self, key: &str) -> Result<Option<String>> {
        let path = self.token_path(key)?;
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let blob: EncryptedBlob = serde_json::from_str(&content).map_err(|_| AuthError::CorruptedStore)?;
        let plaintext = crypto::decrypt(self.key_manager.key(), &blob, key)?;
        let value = String::from_utf8(plaintext).map_err(|_| AuthError::CorruptedStore)?;

        Ok(Some(value))
    }

    async fn save_to_disk(&self, key: &str, value: &str) -> Result<()> {
        let path = self.token_path(key)?;
        let blob = crypto::encrypt(self.key_manager.key(), value.as_bytes(), key)?;
        let blob_json = serde_json::to_string_pretty(&blob)?;

        // Write to a temp file, sync, then rename over the target.
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, blob_json).await?;
        fs::File::open(&temp_path).await?.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl TokenStore for FileTokenStore {
    #[instrument(skip(self, value))]
    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let _lock = self.acquire_lock().await?;
        self.save_to_disk(key, value).await?;
        self.cache
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.cache.read().await.get(key) {
            return Some(value.clone());
        }

        match self.load_from_disk(key).await {
            Ok(Some(value)) => {
                self.cache
                    .write()
                    .await
                    .insert(key.to_string(), value.clone());
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Failed to load token {}: {}", key, e);
                None
            }
        }
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let _lock = self.acquire_lock().await?;

        let mut entries = fs::read_dir(&self.tokens_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() {
                fs::remove_file(&path).await?;
            }
        }

        self.cache.write().await.clear();
        debug!("Cleared all stored tokens");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::StaticSecretProvider;
    use tempfile::TempDir;

    async fn create_test_store(dir: &Path) -> FileTokenStore {
        let secret_provider = Arc::new(StaticSecretProvider::new("test-passphrase"));
        FileTokenStore::with_key_source(dir, secret_provider, KeySource::Passphrase)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;

        store.save("accessToken", "at-1").await.unwrap();
        store.save("accessToken", "at-2").await.unwrap();

        assert_eq!(store.get("accessToken").await.as_deref(), Some("at-2"));
        assert_eq!(store.get("refreshToken").await, None);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = create_test_store(temp.path()).await;
            store.save("accessToken", "persisted").await.unwrap();
        }

        let reopened = create_test_store(temp.path()).await;
        assert_eq!(reopened.get("accessToken").await.as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn test_values_are_not_stored_in_plaintext() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;
        store.save("accessToken", "very-secret-token").await.unwrap();

        let raw = std::fs::read_to_string(temp.path().join("tokens").join("accessToken.json")).unwrap();
        assert!(!raw.contains("very-secret-token"));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;
        store.save("accessToken", "at").await.unwrap();
        store.save("refreshToken", "rt").await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.get("accessToken").await, None);
        store.clear().await.unwrap();
        assert_eq!(store.get("refreshToken").await, None);
    }

    #[tokio::test]
    async fn test_wrong_passphrase_reads_as_absent() {
        let temp = TempDir::new().unwrap();
        {
            let store = create_test_store(temp.path()).await;
            store.save("accessToken", "at").await.unwrap();
        }

        let other = FileTokenStore::with_key_source(
            temp.path(),
            Arc::new(StaticSecretProvider::new("another-passphrase")),
            KeySource::Passphrase,
        )
        .await
        .unwrap();
        assert_eq!(other.get("accessToken").await, None);
    }

    #[tokio::test]
    async fn test_lock_held_elsewhere_blocks_writes() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;

        let held = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(temp.path().join("lock"))
            .unwrap();
        held.lock_exclusive().unwrap();

        assert!(matches!(store.save("accessToken", "at").await, Err(AuthError::LockTimeout)));
        assert!(matches!(store.clear().await, Err(AuthError::LockTimeout)));

        FileExt::unlock(&held).unwrap();
        store.save("accessToken", "at").await.unwrap();
        assert_eq!(store.get("accessToken").await.as_deref(), Some("at"));
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let temp = TempDir::new().unwrap();
        let store = create_test_store(temp.path()).await;
        assert!(matches!(
            store.save("../escape", "x").await,
            Err(AuthError::InvalidConfig(_))
        ));
    }
}
