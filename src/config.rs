use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bs_auth::{KeySource, SupabaseConfig};
use bs_books::BookClientConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ENV_SUPABASE_URL: &str = "BOOKSHELF_SUPABASE_URL";
pub const ENV_SUPABASE_KEY: &str = "BOOKSHELF_SUPABASE_KEY";
pub const DEFAULT_PASSPHRASE_ENV: &str = "BOOKSHELF_PASSPHRASE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub supabase: SupabaseSection,
    pub storage: StorageSection,
    pub books: BooksSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseSection {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Token store directory; platform config dir when unset
    pub dir: Option<PathBuf>,
    pub use_keyring: bool,
    /// Environment variable holding the token store passphrase
    pub passphrase_env: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            dir: None,
            use_keyring: true,
            passphrase_env: DEFAULT_PASSPHRASE_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BooksSection {
    pub base_url: Option<String>,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "bookshelf").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply environment overrides.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        let mut config = match path {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::parse(&content)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_SUPABASE_URL).filter(|v| !v.is_empty()) {
            self.supabase.url = Some(url);
        }
        if let Some(key) = lookup(ENV_SUPABASE_KEY).filter(|v| !v.is_empty()) {
            self.supabase.anon_key = Some(key);
        }
    }

    pub fn supabase_config(&self) -> Result<SupabaseConfig> {
        let url = self.supabase.url.as_deref().with_context(|| {
            format!("Supabase URL is not configured (set supabase.url or {})", ENV_SUPABASE_URL)
        })?;
        let key = self.supabase.anon_key.as_deref().with_context(|| {
            format!("Supabase anon key is not configured (set supabase.anon_key or {})", ENV_SUPABASE_KEY)
        })?;
        SupabaseConfig::new(url, key).context("Invalid Supabase configuration")
    }

    pub fn book_client_config(&self) -> Result<BookClientConfig> {
        match &self.books.base_url {
            Some(url) => BookClientConfig::with_base_url(url).context("Invalid books.base_url"),
            None => BookClientConfig::new().context("Invalid default book service URL"),
        }
    }

    pub fn key_source(&self) -> KeySource {
        if self.storage.use_keyring {
            KeySource::Keyring
        } else {
            KeySource::Passphrase
        }
    }
}
