//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via TABLEDB_CONFIG)
//! 3. Environment variables

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabledb_protocol::{validate_timeout_and_poll_delay, SerialVersion};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline for a single request/response exchange, in milliseconds.
    pub request_timeout_ms: u64,
    /// Default upper bound when waiting for a DDL operation, in milliseconds.
    pub ddl_timeout_ms: u64,
    /// Default interval between DDL completion checks, in milliseconds.
    pub poll_delay_ms: u64,
    /// Serial version to start negotiating from.
    pub serial_version: SerialVersion,
    /// Compartment used when a request does not name one.
    pub compartment: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            ddl_timeout_ms: 120_000,
            poll_delay_ms: 1_000,
            serial_version: SerialVersion::MAX,
            compartment: None,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("TABLEDB_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(ms) = std::env::var("TABLEDB_REQUEST_TIMEOUT_MS") {
            if let Ok(parsed) = ms.parse() {
                self.request_timeout_ms = parsed;
            }
        }

        if let Ok(ms) = std::env::var("TABLEDB_DDL_TIMEOUT_MS") {
            if let Ok(parsed) = ms.parse() {
                self.ddl_timeout_ms = parsed;
            }
        }

        if let Ok(ms) = std::env::var("TABLEDB_POLL_DELAY_MS") {
            if let Ok(parsed) = ms.parse() {
                self.poll_delay_ms = parsed;
            }
        }

        if let Ok(version) = std::env::var("TABLEDB_SERIAL_VERSION") {
            if let Some(parsed) = version
                .parse::<i16>()
                .ok()
                .and_then(|v| SerialVersion::try_from(v).ok())
            {
                self.serial_version = parsed;
            }
        }

        if let Ok(compartment) = std::env::var("TABLEDB_COMPARTMENT") {
            if !compartment.is_empty() {
                self.compartment = Some(compartment);
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        validate_timeout_and_poll_delay(Some(self.ddl_timeout()), Some(self.poll_delay()))
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ddl_timeout(&self) -> Duration {
        millis(self.ddl_timeout_ms)
    }

    pub fn poll_delay(&self) -> Duration {
        millis(self.poll_delay_ms)
    }
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX / 1_000))
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
