//! Configuration types and loading for the relay.

use crate::dns::filter::FilterPolicy;
use crate::error::RelayError;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Main configuration struct for the relay
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_upstream")]
    pub upstream: String,
    #[serde(default = "default_record_file")]
    pub record_file: String,
    #[serde(default)]
    pub filter: FilterPolicy,
    /// Hex-dump every datagram at debug level
    #[serde(default)]
    pub dump_packets: bool,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: default_listen(),
            upstream: default_upstream(),
            record_file: default_record_file(),
            filter: FilterPolicy::default(),
            dump_packets: false,
            correlation: CorrelationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn default_listen() -> String {
    "0.0.0.0:53".to_string()
}

pub fn default_upstream() -> String {
    "8.8.8.8:53".to_string()
}

fn default_record_file() -> String {
    "records.txt".to_string()
}

// ============== Correlation Config ==============

#[derive(Debug, Deserialize, Clone)]
pub struct CorrelationConfig {
    /// Seconds between expiry sweeps of in-flight query entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Seconds an unanswered entry lives before a sweep removes it
    #[serde(default = "default_entry_timeout")]
    pub entry_timeout_secs: u64,
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_entry_timeout() -> u64 {
    30
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            sweep_interval_secs: default_sweep_interval(),
            entry_timeout_secs: default_entry_timeout(),
        }
    }
}

// ============== Logging Config ==============

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter; the RUST_LOG environment variable wins
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// File logging configuration
    #[serde(default)]
    pub file: Option<FileLoggingConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileLoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        FileLoggingConfig {
            log_dir: default_log_dir(),
            file_prefix: default_log_file_prefix(),
            rotation: LogRotation::Daily,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_file_prefix() -> String {
    "relay.log".to_string()
}

// ============== Config Loading ==============

/// Load configuration from file.
///
/// With an explicit path, the file must exist and parse. Otherwise
/// `config.yaml` in the working directory is probed, and defaults are
/// used when it is absent.
pub fn load_config(path: Option<&str>) -> Result<Config, RelayError> {
    let candidate = match path {
        Some(p) => {
            let explicit = PathBuf::from(p);
            if !explicit.exists() {
                return Err(RelayError::Config(format!(
                    "config file not found: {}",
                    explicit.display()
                )));
            }
            explicit
        }
        None => {
            let probed = PathBuf::from("config.yaml");
            if !probed.exists() {
                return Ok(Config::default());
            }
            probed
        }
    };

    let content = fs::read_to_string(&candidate)
        .map_err(|e| RelayError::Config(format!("{}: {}", candidate.display(), e)))?;
    let config: Config = serde_yaml_ng::from_str(&content)
        .map_err(|e| RelayError::Config(format!("{}: {}", candidate.display(), e)))?;
    Ok(config)
}

// ============== Unit Tests ==============
