use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::Result;

/// Durable key-value storage for session token strings
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a value under a key, overwriting any prior value
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Read a value back. Read failures are logged and reported as absent.
    async fn get(&self, key: &str) -> Option<String>;

    /// Remove every persisted value. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<()>;
}

/// In-memory token store for testing and simple use cases
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn clear(&self) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_overwrites_previous_value() {
        let store = MemoryTokenStore::new();
        store.save("accessToken", "first").await.unwrap();
        store.save("accessToken", "second").await.unwrap();
        assert_eq!(store.get("accessToken").await.as_deref(), Some("second"));
        assert_eq!(store.get("missing").await, None);
    }

    #[tokio::test]
    async fn clear_twice_leaves_store_empty() {
        let store = MemoryTokenStore::new();
        store.save("accessToken", "token").await.unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty());
        store.clear().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get("accessToken").await, None);
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = MemoryTokenStore::new();
        let handle = store.clone();
        handle.save("refreshToken", "rt").await.unwrap();
        assert_eq!(store.get("refreshToken").await.as_deref(), Some("rt"));
    }
}
