// src/error.rs
use tabula_core::{ConfigError, CoreError};
use tabula_traits::ResourceError;
use thiserror::Error;

/// Top-level error for the facade and the CLI.
#[derive(Error, Debug)]
pub enum TabulaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Document parsing failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for TabulaError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Config(e) => TabulaError::Config(e),
            CoreError::Resource(e) => TabulaError::Resource(e),
        }
    }
}
