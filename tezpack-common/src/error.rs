use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TezpackError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Checksum Error: {0}")]
    ChecksumError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Build environment setup failed: {0}")]
    BuildEnvError(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Git Error: {0}")]
    Git(String),

    #[error("Service Error: {0}")]
    Service(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for TezpackError {
    fn from(err: std::io::Error) -> Self {
        TezpackError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for TezpackError {
    fn from(err: reqwest::Error) -> Self {
        TezpackError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for TezpackError {
    fn from(err: serde_json::Error) -> Self {
        TezpackError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, TezpackError>;
