//! Error types for Berth

use thiserror::Error;

/// Result type for Berth operations
pub type Result<T> = std::result::Result<T, BerthError>;

/// Berth error types
#[derive(Error, Debug)]
pub enum BerthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Control plane returned {status}: {message}")]
    Transport { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stack already exists: {0}")]
    StackExists(String),

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Secret already exists: {0}")]
    SecretExists(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BerthError {
    /// Whether the error is a 409 conflict from the control plane
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BerthError::StackExists(_)
                | BerthError::SecretExists(_)
                | BerthError::Transport { status: 409, .. }
        )
    }
}
