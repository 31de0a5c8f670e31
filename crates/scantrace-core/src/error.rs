//! Error types for ScanTrace

use thiserror::Error;

/// Result type alias using ScanTrace's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ScanTrace operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Span exporter could not be built
    #[error("Exporter error: {0}")]
    Exporter(String),

    /// Flushing buffered spans failed or timed out
    #[error("Flush error: {0}")]
    Flush(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an exporter error
    pub fn exporter(msg: impl Into<String>) -> Self {
        Self::Exporter(msg.into())
    }

    /// Create a flush error
    pub fn flush(msg: impl Into<String>) -> Self {
        Self::Flush(msg.into())
    }
}
