use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiftError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Duplicate item: {0}")]
    DuplicateItem(String),

    #[error("Oracle contract violation: {0}")]
    OracleContract(String),

    #[error("Oracle left {unresolved} item(s) unclassified after all retries")]
    OracleIncomplete { unresolved: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SiftError>;
