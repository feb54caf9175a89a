//! TOML configuration for the cursor CRC test binary.
//!
//! The file describes the simulated display the test runs against and the
//! log level:
//!
//! ```toml
//! [general]
//! log_level = "debug"
//!
//! [device]
//! max_cursor_width = 256
//! max_cursor_height = 256
//! pipes = 3
//!
//! [[outputs]]
//! name = "HDMI-A-1"
//! width = 1920
//! height = 1080
//!
//! [faults]
//! crc_unsupported_pipes = [2]
//! cursor_clip = "short-by-one"
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = ...)]`, so an empty file (or no file
//! at all) yields one 1920x1080 `HDMI-A-1` output on a three-pipe device with
//! a 256x256 cursor limit and no faults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::sim::{ClipFault, MAX_FB_DIMENSION};

/// Environment variable consulted for the config path when `--config` is absent.
pub const CONFIG_ENV: &str = "CURSOR_CRC_CONFIG";

/// Most pipes a simulated device may have; each gets a letter `A`..=`Z`.
pub const MAX_PIPES: u32 = 26;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The TOML parsed but describes an impossible display.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default = "default_outputs")]
    pub outputs: Vec<OutputConfig>,
    #[serde(default)]
    pub faults: FaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Capabilities of the simulated display controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "default_max_cursor")]
    pub max_cursor_width: u32,
    #[serde(default = "default_max_cursor")]
    pub max_cursor_height: u32,
    /// Number of pipes (CRTCs); pipe `n` prints as the `n`-th letter.
    #[serde(default = "default_pipes")]
    pub pipes: u32,
}

/// One connected output and its fixed mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    pub name: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

/// Deliberate misbehaviour injected into the simulated device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FaultConfig {
    /// Pipe indices whose CRC source reports "unsupported".
    #[serde(default)]
    pub crc_unsupported_pipes: Vec<u32>,
    #[serde(default)]
    pub cursor_clip: ClipFault,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_cursor() -> u32 {
    256
}
fn default_pipes() -> u32 {
    3
}
fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_outputs() -> Vec<OutputConfig> {
    vec![OutputConfig {
        name: "HDMI-A-1".to_string(),
        width: default_width(),
        height: default_height(),
    }]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            device: DeviceConfig::default(),
            outputs: default_outputs(),
            faults: FaultConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_cursor_width: default_max_cursor(),
            max_cursor_height: default_max_cursor(),
            pipes: default_pipes(),
        }
    }
}

impl AppConfig {
    /// Rejects devices and outputs the simulation could not drive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for more than [`MAX_PIPES`] pipes, a
    /// cursor limit or mode outside `1..=MAX_FB_DIMENSION`, or a duplicate
    /// output name.  A zero cursor limit is allowed and registers no subtests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let device = &self.device;
        if device.pipes > MAX_PIPES {
            return Err(ConfigError::Invalid(format!(
                "{} pipes requested, at most {MAX_PIPES} supported",
                device.pipes
            )));
        }
        if device.max_cursor_width > MAX_FB_DIMENSION || device.max_cursor_height > MAX_FB_DIMENSION
        {
            return Err(ConfigError::Invalid(format!(
                "cursor limit {}x{} exceeds {MAX_FB_DIMENSION}",
                device.max_cursor_width, device.max_cursor_height
            )));
        }

        let mut names = HashSet::new();
        for output in &self.outputs {
            if output.width == 0 || output.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "output {} has an empty mode {}x{}",
                    output.name, output.width, output.height
                )));
            }
            if output.width > MAX_FB_DIMENSION || output.height > MAX_FB_DIMENSION {
                return Err(ConfigError::Invalid(format!(
                    "output {} mode {}x{} exceeds {MAX_FB_DIMENSION}",
                    output.name, output.width, output.height
                )));
            }
            if !names.insert(output.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "output {} is listed twice",
                    output.name
                )));
            }
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates config TOML.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML and
/// [`ConfigError::Invalid`] if validation fails.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let cfg: AppConfig = toml::from_str(content)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Loads the config at `path`, returning `AppConfig::default()` when no path
/// is given or the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and the errors of [`parse_config`] otherwise.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
