//! Error types for configuration and session setup, plus the non-error
//! notes the convergence loop records.

use tabula_traits::ResourceError;
use tabula_types::RegionKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid base URL: {0}")]
    BaseUrl(#[source] ResourceError),
    #[error("Invalid configuration value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// The main error enum for session-level operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Conditions the convergence loop recovers from on its own. Logged, never
/// returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvergenceNote {
    #[error(
        "Section {section}: {} region(s) still unmeasured after {attempts} paint(s), using estimates",
        .unresolved.len()
    )]
    MeasurementTimeout {
        section: usize,
        attempts: u32,
        unresolved: Vec<RegionKey>,
    },
}
