//! # raudio common library
//!
//! Shared code for the raudio workspace:
//! - Configuration loading (TOML bootstrap file with built-in defaults)
//! - Error policy for error-level reports
//! - Common error type

pub mod config;
pub mod error;
pub mod policy;

pub use config::AudioConfig;
pub use error::{Error, Result};
pub use policy::ErrorPolicy;
