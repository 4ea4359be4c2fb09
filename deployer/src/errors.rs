//! Error types for the Sitewright deployer

use thiserror::Error;

/// Main error type for the deployment subsystem
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Credential error: {0}")]
    CredentialError(String),

    #[error("Connectivity error: {0}")]
    ConnectivityError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DeployerError {
    fn from(err: anyhow::Error) -> Self {
        DeployerError::Internal(err.to_string())
    }
}
