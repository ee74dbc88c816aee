use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiTriageError {
    #[error("CI API request failed: {0}")]
    Api(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unrecognized target: {0}")]
    UnrecognizedTarget(String),

    #[error("Malformed failure entry: {0}")]
    MalformedEntry(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CiTriageError>;
