use thiserror::Error;

#[derive(Error, Debug)]
pub enum CountryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode API response: {reason}")]
    Decode { reason: String },

    #[error("Country not found: {query}")]
    CountryNotFound { query: String },

    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, CountryError>;
