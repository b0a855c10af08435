//! Daemon configuration.
//!
//! Every setting resolves with the same precedence:
//!
//! ```text
//!   command line  >  DPSD_PORT / DPSD_DEVICE  >  config file  >  default
//! ```
//!
//! The config file is TOML. Its default location is
//! `<config_dir>/dpsd/config.toml`; a missing default file is fine, a
//! missing file named with `--config` is an error.
//!
//! ```toml
//! device = "/dev/ttyACM0"
//! baud_rate = 115200
//! port = 5025
//!
//! [identity]
//! serial = "A1234"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use dps_scpi::Identity;

/// Default TCP port (the IANA registered SCPI raw socket port).
pub const DEFAULT_PORT: u16 = 5025;

/// Default serial device.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Environment variable overriding the TCP port.
pub const PORT_ENV: &str = "DPSD_PORT";

/// Environment variable overriding the serial device.
pub const DEVICE_ENV: &str = "DPSD_DEVICE";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Settings given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub port: Option<u16>,
    pub verbose: bool,
    pub simulate: bool,
    pub config_path: Option<PathBuf>,
}

/// Contents of the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub port: Option<u16>,
    pub verbose: Option<bool>,
    pub simulate: Option<bool>,
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// `[identity]` table: fields reported by `*IDN?`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
}

impl IdentityConfig {
    fn resolve(self) -> Identity {
        let defaults = Identity::default();
        Identity {
            manufacturer: self.manufacturer.unwrap_or(defaults.manufacturer),
            model: self.model.unwrap_or(defaults.model),
            serial: self.serial.unwrap_or(defaults.serial),
            firmware: self.firmware.unwrap_or(defaults.firmware),
        }
    }
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Serial device path
    pub device: String,
    pub baud_rate: u32,
    /// TCP port to listen on
    pub port: u16,
    pub verbose: bool,
    /// Use the in-memory supply instead of the serial device
    pub simulate: bool,
    pub identity: Identity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            port: DEFAULT_PORT,
            verbose: false,
            simulate: false,
            identity: Identity::default(),
        }
    }
}

impl Config {
    /// Returns the default config file location, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dpsd").join("config.toml"))
    }

    /// Loads configuration from the process environment and config file.
    pub fn load(cli: &Overrides) -> Result<Self, ConfigError> {
        Self::load_with_env(cli, |name| std::env::var(name).ok())
    }

    /// Loads configuration, reading environment variables through `env`.
    pub fn load_with_env(
        cli: &Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match &cli.config_path {
            Some(path) => Some(read_file(path)?),
            None => match Self::default_path() {
                Some(path) if path.exists() => Some(read_file(&path)?),
                _ => None,
            },
        };

        let env_port = match env(PORT_ENV) {
            Some(value) => Some(value.trim().parse::<u16>().map_err(|_| {
                ConfigError::InvalidEnv {
                    name: PORT_ENV,
                    value: value.clone(),
                }
            })?),
            None => None,
        };
        let env_device = env(DEVICE_ENV).filter(|value| !value.is_empty());

        Ok(Self::merge(cli, env_port, env_device, file.unwrap_or_default()))
    }

    fn merge(
        cli: &Overrides,
        env_port: Option<u16>,
        env_device: Option<String>,
        file: FileConfig,
    ) -> Self {
        let defaults = Self::default();
        Self {
            device: cli
                .device
                .clone()
                .or(env_device)
                .or(file.device)
                .unwrap_or(defaults.device),
            baud_rate: cli
                .baud_rate
                .or(file.baud_rate)
                .unwrap_or(defaults.baud_rate),
            port: cli.port.or(env_port).or(file.port).unwrap_or(defaults.port),
            verbose: cli.verbose || file.verbose.unwrap_or(defaults.verbose),
            simulate: cli.simulate || file.simulate.unwrap_or(defaults.simulate),
            identity: file.identity.resolve(),
        }
    }
}

/// Reads and parses a config file.
pub fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(file)
}
