//! Error types for the raudio engine
//!
//! Every failure is logged by the operation that detects it and returned as
//! one of these variants. The mixing callback has no error channel and never
//! produces them: it degrades to silence instead.

use thiserror::Error;

/// Main error type for the raudio engine
#[derive(Error, Debug)]
pub enum Error {
    /// Sample storage or converter scratch could not be allocated
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    /// Audio device could not be opened or started
    #[error("Device init failure: {0}")]
    DeviceInit(String),

    /// Audio output stream runtime errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Unknown buffer, zero-sized buffer, wrong sample type, bad frame range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Write larger than a stream sub-buffer
    #[error("Capacity overflow: {requested} frames requested, {capacity} available")]
    CapacityOverflow {
        /// Frames the caller tried to write
        requested: usize,
        /// Frames one sub-buffer can hold
        capacity: usize,
    },

    /// Streaming protocol state does not allow the operation
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// File type or codec not handled
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] raudio_common::Error),
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => Error::Io(e),
            hound::Error::Unsupported => {
                Error::UnsupportedFormat("WAV encoding not supported".to_string())
            }
            other => Error::Decode(format!("WAV: {}", other)),
        }
    }
}

/// Convenience Result type using the raudio Error
pub type Result<T> = std::result::Result<T, Error>;
