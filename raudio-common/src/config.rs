//! Configuration loading and config file resolution
//!
//! The engine is configured from a small TOML bootstrap file. Every field has
//! a built-in default, so a missing file (or a file that only sets a few keys)
//! is valid.
//!
//! # Config file resolution order
//!
//! 1. Command-line argument (highest priority)
//! 2. `RAUDIO_CONFIG` environment variable
//! 3. `<platform config dir>/raudio/config.toml`
//! 4. Built-in defaults (no file)
//!
//! ```toml
//! [device]
//! sample_rate = 48000
//! channels = 2
//!
//! [stream]
//! default_buffer_frames = 4096
//!
//! [logging]
//! level = "debug"
//! fatal_errors = false
//! ```

use crate::policy::ErrorPolicy;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable holding an explicit config file path
pub const CONFIG_ENV_VAR: &str = "RAUDIO_CONFIG";

/// Lowest accepted device sample rate
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest accepted device sample rate
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Highest accepted device channel count
pub const MAX_CHANNELS: u16 = 8;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device selection and fixed mixing format
    pub device: DeviceConfig,

    /// Streaming buffer sizing
    pub stream: StreamConfig,

    /// Logging and error policy
    pub logging: LoggingConfig,
}

/// Output device configuration
///
/// `sample_rate` and `channels` define the fixed device output format every
/// buffer is converted to. Samples are always f32.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Output device name (None = host default device)
    pub name: Option<String>,

    /// Device output sample rate in Hz
    pub sample_rate: u32,

    /// Device output channel count
    pub channels: u16,

    /// Requested hardware period in frames (None = device default)
    pub period_frames: Option<u32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: None,
            sample_rate: 44_100,
            channels: 2,
            period_frames: None,
        }
    }
}

/// Streaming buffer configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Size of one stream sub-buffer in frames (0 = sample_rate / 30)
    pub default_buffer_frames: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Terminate the process after an error-level report
    pub fatal_errors: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            fatal_errors: false,
        }
    }
}

impl AudioConfig {
    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AudioConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load_file(path: &Path) -> Result<Self> {
        debug!("Loading config file: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolve the config file and load it, falling back to defaults.
    ///
    /// A config file that does not exist is not an error: a warning is logged
    /// and the built-in defaults are used. A file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => Self::load_file(&path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let rate = self.device.sample_rate;
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
            return Err(Error::Config(format!(
                "device.sample_rate {} outside {}..={}",
                rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }

        let channels = self.device.channels;
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::Config(format!(
                "device.channels {} outside 1..={}",
                channels, MAX_CHANNELS
            )));
        }

        if self.device.period_frames == Some(0) {
            return Err(Error::Config(
                "device.period_frames must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Error policy selected by `logging.fatal_errors`
    pub fn error_policy(&self) -> ErrorPolicy {
        if self.logging.fatal_errors {
            ErrorPolicy::Exit
        } else {
            ErrorPolicy::Continue
        }
    }
}

/// Resolve the config file path following the documented priority order.
///
/// Returns None when neither an explicit path nor a platform config file
/// exists.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|path| path.exists())
}

/// Platform config file location (`~/.config/raudio/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("raudio").join("config.toml"))
}
