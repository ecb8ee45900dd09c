//! Configuration management for the tbapi server.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use tbapi_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("config.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `TBAPI_BUFFER__CAPACITY`.
const ENV_PREFIX: &str = "TBAPI";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// gRPC settings
    #[serde(default)]
    pub grpc: GrpcSettings,

    /// Write buffer settings
    #[serde(default)]
    pub buffer: BufferSettings,

    /// Ledger settings
    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server network settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    50051
}

/// Optional gRPC services.
///
/// Both are off unless enabled:
///
/// - `TBAPI_GRPC__REFLECTION=true` - Enable gRPC reflection
/// - `TBAPI_GRPC__HEALTH_CHECK=true` - Enable gRPC health check service
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GrpcSettings {
    /// Enable gRPC reflection for service discovery.
    ///
    /// When enabled, clients like grpcurl can discover available services
    /// without needing the proto files.
    #[serde(default)]
    pub reflection: bool,

    /// Enable the standard `grpc.health.v1` health service.
    #[serde(default)]
    pub health_check: bool,
}

/// Write buffer settings.
///
/// # Example YAML Configuration
///
/// ```yaml
/// buffer:
///   enabled: true
///   capacity: 1024
///   delay_ms: 100
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BufferSettings {
    /// Coalesce concurrent transfer writes into shared ledger calls.
    ///
    /// When disabled every request goes to the ledger on its own.
    /// Environment variable: `TBAPI_BUFFER__ENABLED`
    #[serde(default)]
    pub enabled: bool,

    /// Number of requests that triggers an immediate flush.
    ///
    /// Environment variable: `TBAPI_BUFFER__CAPACITY`
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,

    /// Maximum time in milliseconds the first request of a batch waits
    /// before the batch is flushed.
    ///
    /// Environment variable: `TBAPI_BUFFER__DELAY_MS`
    #[serde(default = "default_buffer_delay_ms")]
    pub delay_ms: u64,
}

impl BufferSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_buffer_capacity(),
            delay_ms: default_buffer_delay_ms(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_buffer_delay_ms() -> u64 {
    100
}

/// Ledger backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LedgerSettings {
    /// Ledger backend type. Only "memory" is available.
    #[serde(default = "default_ledger_backend")]
    pub backend: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
        }
    }
}

fn default_ledger_backend() -> String {
    "memory".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

fn env_source() -> Environment {
    // __ separates nested keys: TBAPI_SERVER__PORT -> server.port
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `TBAPI_` and use `__` as separator.
    /// For example:
    /// - `TBAPI_SERVER__PORT=9090` overrides `server.port`
    /// - `TBAPI_BUFFER__ENABLED=true` overrides `buffer.enabled`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    ///
    /// Uses default values and allows overrides via TBAPI_ prefixed env vars.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(env_source())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.server.port == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "server.port must be greater than 0".to_string(),
            });
        }

        // Buffer limits only matter when buffering is on.
        if self.buffer.enabled {
            if self.buffer.capacity == 0 {
                return Err(ConfigLoadError::Invalid {
                    message: "buffer.capacity must be greater than 0".to_string(),
                });
            }
            if self.buffer.delay_ms == 0 {
                return Err(ConfigLoadError::Invalid {
                    message: "buffer.delay_ms must be greater than 0".to_string(),
                });
            }
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.ledger.backend.as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "ledger.backend must be one of: {:?}, got: {}",
                    valid_backends, self.ledger.backend
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Test: Can load config from YAML file
    #[test]
    #[serial]
    fn test_can_load_config_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9090

grpc:
  reflection: true

buffer:
  enabled: true
  capacity: 256
  delay_ms: 5

logging:
  level: debug
  json: true
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert!(config.grpc.reflection);
        assert!(!config.grpc.health_check);
        assert!(config.buffer.enabled);
        assert_eq!(config.buffer.capacity, 256);
        assert_eq!(config.buffer.delay(), Duration::from_millis(5));
        assert_eq!(config.ledger.backend, "memory");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    /// Test: Can override config with env vars
    #[test]
    #[serial]
    fn test_can_override_config_with_env_vars() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 8080

buffer:
  enabled: false
"#
        )
        .unwrap();

        std::env::set_var("TBAPI_SERVER__PORT", "9999");
        std::env::set_var("TBAPI_BUFFER__ENABLED", "true");
        std::env::set_var("TBAPI_BUFFER__CAPACITY", "64");

        let config = ServerConfig::load(file.path());

        std::env::remove_var("TBAPI_SERVER__PORT");
        std::env::remove_var("TBAPI_BUFFER__ENABLED");
        std::env::remove_var("TBAPI_BUFFER__CAPACITY");

        let config = config.unwrap();
        assert_eq!(config.server.port, 9999); // Overridden by env
        assert_eq!(config.server.host, "127.0.0.1"); // From file
        assert!(config.buffer.enabled);
        assert_eq!(config.buffer.capacity, 64);
        assert_eq!(config.buffer.delay_ms, 100); // Default
    }

    /// Test: Config validation catches errors
    #[test]
    fn test_config_validation_catches_errors() {
        let mut config = ServerConfig::default();
        config.server.port = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));

        let mut config = ServerConfig::default();
        config.ledger.backend = "postgres".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ledger.backend"));

        let mut config = ServerConfig::default();
        config.logging.level = "invalid".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    /// Test: Buffer limits are validated only when buffering is enabled
    #[test]
    fn test_buffer_limits_validated_when_enabled() {
        let mut config = ServerConfig::default();
        config.buffer.capacity = 0;
        config.buffer.delay_ms = 0;
        assert!(config.validate().is_ok());

        config.buffer.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer.capacity"));

        config.buffer.capacity = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer.delay_ms"));

        config.buffer.delay_ms = 1;
        assert!(config.validate().is_ok());
    }

    /// Test: Invalid config returns clear error
    #[test]
    fn test_invalid_config_returns_clear_error() {
        let result = ServerConfig::load("/nonexistent/path/config.yaml");
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
        assert!(err.to_string().contains("not found"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: syntax: [").unwrap();

        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Load(_)));
    }

    /// Test: Default config is valid
    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 50051);
        assert!(!config.buffer.enabled);
        assert_eq!(config.buffer.capacity, 1024);
        assert_eq!(config.buffer.delay(), Duration::from_millis(100));
        assert!(!config.grpc.reflection);
        assert!(!config.grpc.health_check);
        assert_eq!(config.logging.level, "info");
    }

    /// Test: from_env loads defaults with env overrides
    #[test]
    #[serial]
    fn test_from_env_loads_defaults_with_env_overrides() {
        std::env::set_var("TBAPI_SERVER__HOST", "192.168.1.1");
        std::env::set_var("TBAPI_BUFFER__DELAY_MS", "250");

        let config = ServerConfig::from_env();

        std::env::remove_var("TBAPI_SERVER__HOST");
        std::env::remove_var("TBAPI_BUFFER__DELAY_MS");

        let config = config.unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 50051); // default
        assert_eq!(config.buffer.delay_ms, 250);
    }
}
