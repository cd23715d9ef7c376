//! Configuration types for ncapi-rs.

use std::path::PathBuf;

use serde::Deserialize;

use crate::device::DEFAULT_MAX_DEVICES;
use crate::error::{NcError, Result};
use crate::graph::FifoOptions;
use crate::native::{FifoDataType, LogLevel};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Driver configuration.
    #[serde(default)]
    pub driver: DriverConfig,

    /// Fifos allocated together with a graph.
    #[serde(default)]
    pub fifo: FifoConfig,
}

/// Driver configuration.
#[derive(Debug, Deserialize)]
pub struct DriverConfig {
    /// Path to the driver library. The platform's default names are tried
    /// when unset.
    #[serde(default)]
    pub library: Option<PathBuf>,

    /// Number of device indices probed during enumeration.
    #[serde(default = "default_max_devices")]
    pub max_devices: u32,

    /// Driver log level (debug, info, warn, error, fatal).
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            library: None,
            max_devices: default_max_devices(),
            log_level: None,
        }
    }
}

impl DriverConfig {
    /// The configured driver log level, if any.
    pub fn log_level(&self) -> Result<Option<LogLevel>> {
        self.log_level.as_deref().map(parse_log_level).transpose()
    }
}

/// Fifo configuration.
#[derive(Debug, Deserialize)]
pub struct FifoConfig {
    /// Capacity of the input fifo, in elements.
    #[serde(default = "default_elements")]
    pub input_elements: u32,

    /// Capacity of the output fifo, in elements.
    #[serde(default = "default_elements")]
    pub output_elements: u32,

    /// Element type of the input fifo (fp16, fp32).
    #[serde(default = "default_data_type")]
    pub input_data_type: String,

    /// Element type of the output fifo (fp16, fp32).
    #[serde(default = "default_data_type")]
    pub output_data_type: String,

    /// Return instead of blocking on an empty or full fifo.
    #[serde(default)]
    pub dont_block: bool,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            input_elements: default_elements(),
            output_elements: default_elements(),
            input_data_type: default_data_type(),
            output_data_type: default_data_type(),
            dont_block: false,
        }
    }
}

impl FifoConfig {
    /// Fifo options for [`Graph::allocate_with_fifos`](crate::Graph::allocate_with_fifos).
    pub fn options(&self) -> Result<FifoOptions> {
        if self.input_elements == 0 || self.output_elements == 0 {
            return Err(NcError::config("fifo element counts must be at least 1"));
        }
        Ok(FifoOptions {
            input_elements: self.input_elements,
            input_data_type: parse_data_type(&self.input_data_type)?,
            output_elements: self.output_elements,
            output_data_type: parse_data_type(&self.output_data_type)?,
        })
    }
}

fn default_max_devices() -> u32 {
    DEFAULT_MAX_DEVICES
}

fn default_elements() -> u32 {
    2
}

fn default_data_type() -> String {
    "fp32".to_string()
}

fn parse_data_type(s: &str) -> Result<FifoDataType> {
    match s.to_lowercase().as_str() {
        "fp16" => Ok(FifoDataType::Fp16),
        "fp32" => Ok(FifoDataType::Fp32),
        other => Err(NcError::config(format!(
            "Unknown fifo data type: {}. Use 'fp16' or 'fp32'",
            other
        ))),
    }
}

fn parse_log_level(s: &str) -> Result<LogLevel> {
    match s.to_lowercase().as_str() {
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" | "warning" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        "fatal" => Ok(LogLevel::Fatal),
        other => Err(NcError::config(format!("Unknown log level: {}", other))),
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}
