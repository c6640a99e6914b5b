//! Configuration handling for the logger.
//!
//! Settings come from an optional YAML file with a `logger:` section,
//! followed by environment variable overrides. Command line flags are merged
//! on top by `main`.

use anyhow::Result;
use logger_transport::DEFAULT_BAUD_RATE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Default sample rate in Hz
pub const DEFAULT_RATE_HZ: f64 = 100.0;

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Serial port path, derived from the device number when unset
    pub port: Option<String>,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Sample rate in Hz
    pub rate: f64,
    /// Explicit list of sensor report ids, replaces the mode selection
    pub sensors: Option<Vec<u8>>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            rate: DEFAULT_RATE_HZ,
            sensors: None,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    logger: Option<LoggerConfig>,
}

impl LoggerConfig {
    /// Load configuration from an optional file, then the environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let mut config = Self::default();
                config.apply_environment_overrides();
                Ok(config)
            }
        }
    }

    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    if let Some(logger) = root.logger {
                        config = logger;
                    }
                    info!("Loaded configuration from {:?}", path);
                }
                Err(e) => warn!("Failed to parse config file {:?} ({}), using defaults", path, e),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", path),
        }

        config.apply_environment_overrides();

        info!(
            "Logger configuration: port={}, baud_rate={}, rate={} Hz",
            config.port.as_deref().unwrap_or("<device number>"),
            config.baud_rate,
            config.rate
        );

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("SH2_LOGGER_PORT") {
            info!("Serial port overridden by environment: {}", port);
            self.port = Some(port);
        }

        if let Some(baud_rate) = lookup("SH2_LOGGER_BAUD_RATE") {
            match baud_rate.parse::<u32>() {
                Ok(rate) => {
                    self.baud_rate = rate;
                    info!("Baud rate overridden by environment: {}", rate);
                }
                Err(_) => warn!("Ignoring invalid SH2_LOGGER_BAUD_RATE {:?}", baud_rate),
            }
        }

        if let Some(rate) = lookup("SH2_LOGGER_RATE") {
            match rate.parse::<f64>() {
                Ok(hz) => {
                    self.rate = hz;
                    info!("Sample rate overridden by environment: {} Hz", hz);
                }
                Err(_) => warn!("Ignoring invalid SH2_LOGGER_RATE {:?}", rate),
            }
        }
    }
}
