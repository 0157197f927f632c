// Sentry Cam Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentryCamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Output directory not writable: {0}")]
    OutputDir(String),

    #[error("Frame source error: {0}")]
    Source(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for SentryCamError {
    fn from(err: anyhow::Error) -> Self {
        SentryCamError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SentryCamError>;
