//! # Configuration Management
//!
//! Centralized configuration for the Generic Byte client and server models.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (prefix `MESH_BYTE_`)
//!
//! ## Timeouts
//! The access layer only accepts reliable timeouts within
//! [`RELIABLE_TIMEOUT_MIN`, `RELIABLE_TIMEOUT_MAX`]. The client defaults to
//! the minimum so a lost reply frees the request slot as soon as possible.

use crate::error::{ModelError, Result};
use crate::transport::{RELIABLE_TIMEOUT_MAX, RELIABLE_TIMEOUT_MIN};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Default number of frames in an unacknowledged Set burst
pub const DEFAULT_UNRELIABLE_REPEATS: u8 = 2;

/// Largest unacknowledged Set burst accepted by validation
pub const MAX_UNRELIABLE_REPEATS: u8 = 10;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ModelConfig {
    /// Client model configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Server model configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ModelConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ModelError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ModelError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ModelError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = env_parse::<u16>("MESH_BYTE_CLIENT_ELEMENT") {
            config.client.element_index = val;
        }

        if let Some(val) = env_parse::<u16>("MESH_BYTE_SERVER_ELEMENT") {
            config.server.element_index = val;
        }

        if let Some(val) = env_parse::<u64>("MESH_BYTE_RELIABLE_TIMEOUT_MS") {
            config.client.reliable_timeout = Duration::from_millis(val);
        }

        if let Some(val) = env_parse::<u8>("MESH_BYTE_UNRELIABLE_REPEATS") {
            config.client.unreliable_repeats = val;
        }

        if let Some(val) = env_parse::<Level>("MESH_BYTE_LOG_LEVEL") {
            config.logging.log_level = val;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ModelError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ModelError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ModelError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Client model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Element the client model is added to
    pub element_index: u16,

    /// Timeout handed to the access layer for Set/Get
    #[serde(with = "duration_serde")]
    pub reliable_timeout: Duration,

    /// Frames per unacknowledged Set burst
    pub unreliable_repeats: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            element_index: 0,
            reliable_timeout: RELIABLE_TIMEOUT_MIN,
            unreliable_repeats: DEFAULT_UNRELIABLE_REPEATS,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.reliable_timeout < RELIABLE_TIMEOUT_MIN {
            errors.push(format!(
                "Reliable timeout too short: {}ms (minimum: {}ms)",
                self.reliable_timeout.as_millis(),
                RELIABLE_TIMEOUT_MIN.as_millis()
            ));
        } else if self.reliable_timeout > RELIABLE_TIMEOUT_MAX {
            errors.push(format!(
                "Reliable timeout too long: {}ms (maximum: {}ms)",
                self.reliable_timeout.as_millis(),
                RELIABLE_TIMEOUT_MAX.as_millis()
            ));
        }

        if self.unreliable_repeats == 0 {
            errors.push("Unreliable repeats must be greater than 0".to_string());
        } else if self.unreliable_repeats > MAX_UNRELIABLE_REPEATS {
            errors.push(format!(
                "Unreliable repeats too high: {} (maximum: {})",
                self.unreliable_repeats, MAX_UNRELIABLE_REPEATS
            ));
        }

        errors
    }
}

/// Server model configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Element the server model is added to
    pub element_index: u16,
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        // Whether the element exists is only known to the access layer
        Vec::new()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("mesh-generic-byte"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
