use thiserror::Error;

/// Book lookup error types
#[derive(Error, Debug)]
pub enum BooksError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, BooksError>;
