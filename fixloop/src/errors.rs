//! Error types for the fix loop

use thiserror::Error;

/// Main error type for the fix loop
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Monitor error: {0}")]
    MonitorError(String),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Fix generation error: {0}")]
    FixGenerationError(String),

    #[error("Apply error: {0}")]
    ApplyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for LoopError {
    fn from(err: anyhow::Error) -> Self {
        LoopError::Internal(err.to_string())
    }
}
