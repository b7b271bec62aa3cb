//! Error types for the zenith_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zenith_core operations
///
/// Domain no-ops (a rejected stop, stopping with nothing active, deleting an
/// unknown session) are reported as outcomes by the store, not as errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted state error
    #[error("State error: {0}")]
    State(String),

    /// Breathing engine or level selection error
    #[error("Breathing error: {0}")]
    Breathing(String),

    /// A timestamp argument could not be understood
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    /// A fasting target outside `(0, MAX_TARGET_HOURS]`
    #[error("Invalid target: {0} hours (must be above 0 and at most {max})", max = crate::types::MAX_TARGET_HOURS)]
    InvalidTarget(f64),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
