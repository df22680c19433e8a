use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("{0}")]
    TokenFetch(String),
    #[error("Failed to fetch data from the server.")]
    Transport {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed batch response: {0}")]
    Parse(String),
    #[error("invalid batch request: {0}")]
    InvalidRequest(String),
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BatchError>;
