use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::errors::Result;

pub const DEFAULT_BASE_URL: &str = "https://openlibrary.org/";
pub const SEARCH_PATH: &str = "search.json";

/// Rendered when the search has no usable result
pub const NOT_FOUND: &str = "Book information not found.";

/// Configuration for BookClient
#[derive(Debug, Clone)]
pub struct BookClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl BookClientConfig {
    /// Configuration pointing at the public Open Library instance
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            timeout: Duration::from_secs(30),
            user_agent: "bookshelf".to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchDoc {
    #[serde(default)]
    author_name: Vec<String>,
    #[serde(default)]
    first_publish_year: Option<i64>,
    #[serde(default)]
    key: Option<String>,
}

/// Metadata of the best search match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookInfo {
    pub authors: Vec<String>,
    pub first_publish_year: Option<i64>,
    pub key: String,
}

impl From<SearchDoc> for BookInfo {
    fn from(doc: SearchDoc) -> Self {
        Self {
            authors: doc.author_name,
            first_publish_year: doc.first_publish_year,
            key: doc.key.unwrap_or_default(),
        }
    }
}

impl fmt::Display for BookInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Author: {}", self.authors.join(", "))?;
        match self.first_publish_year {
            Some(year) => writeln!(f, "Published: {}", year)?,
            None => writeln!(f, "Published: unknown")?,
        }
        write!(f, "Key: {}", self.key)
    }
}

/// Single-request client for the Open Library search API
#[derive(Debug, Clone)]
pub struct BookClient {
    config: BookClientConfig,
    http: Client,
}

impl BookClient {
    pub fn new(config: BookClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { config, http })
    }

    fn search_url(&self, title: &str) -> Result<Url> {
        let mut url = self.config.base_url.join(SEARCH_PATH)?;
        url.query_pairs_mut().append_pair("title", title);
        Ok(url)
    }

    /// First search result for a title. A non-success status counts as not found.
    #[instrument(skip(self))]
    pub async fn lookup(&self, title: &str) -> Result<Option<BookInfo>> {
        let url = self.search_url(title)?;
        debug!("Searching Open Library");
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            debug!("Search returned {}", response.status());
            return Ok(None);
        }

        let search: SearchResponse = response.json().await?;
        Ok(search.docs.into_iter().next().map(BookInfo::from))
    }

    /// Display text for a title's detail view
    pub async fn describe(&self, title: &str) -> Result<String> {
        Ok(self
            .lookup(title)
            .await?
            .map(|info| info.to_string())
            .unwrap_or_else(|| NOT_FOUND.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_title() {
        let client = BookClient::new(BookClientConfig::new().unwrap()).unwrap();
        let url = client.search_url("Война и мир").unwrap();
        assert_eq!(url.host_str(), Some("openlibrary.org"));
        assert_eq!(url.path(), "/search.json");
        let (name, value) = url.query_pairs().next().unwrap();
        assert_eq!(name, "title");
        assert_eq!(value, "Война и мир");
    }

    #[test]
    fn info_renders_all_authors() {
        let info = BookInfo {
            authors: vec!["Ilf".to_string(), "Petrov".to_string()],
            first_publish_year: Some(1928),
            key: "/works/OL1W".to_string(),
        };
        assert_eq!(info.to_string(), "Author: Ilf, Petrov\nPublished: 1928\nKey: /works/OL1W");
    }
}
