//! Common error types for raudio

use thiserror::Error;

/// Common result type for raudio-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or validating shared configuration
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or schema error
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration value out of range
    #[error("Configuration error: {0}")]
    Config(String),
}
