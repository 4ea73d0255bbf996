//! Error types for the stim_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stim_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed structural input: wrong atom kind or position, amplitude or
    /// duration off its legal grid, broken counter-pulse relation, bad
    /// electrode sets, zero repetitions, empty append target
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutation not allowed in the object's current state, e.g. extending a
    /// function whose signal form is already complete
    #[error("Illegal state: {0}")]
    IllegalState(String),

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

    /// Protocol file could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// True for the two model validation variants
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::IllegalState(_))
    }
}
