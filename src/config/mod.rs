//! Configuration module for the oracle console
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`ORACLE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use oracle::config::ConsoleConfig;
//!
//! let config = ConsoleConfig::default();
//! assert_eq!(config.server.base_url, "http://127.0.0.1:8080");
//!
//! let toml = r#"
//! [server]
//! base_url = "https://oracle.example.com"
//! "#;
//! let config: ConsoleConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.base_url, "https://oracle.example.com");
//! assert_eq!(config.monitor.refresh_interval_seconds, 30);
//! ```

pub mod error;
pub mod logging;
pub mod monitor;
pub mod server;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use monitor::MonitorConfig;
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the console.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Oracle server location
    pub server: ServerConfig,
    /// Monitoring console cadence
    pub monitor: MonitorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ConsoleConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Only settings without a command-line flag are read here; `ORACLE_URL`
    /// and `ORACLE_LOG_LEVEL` arrive through the CLI arguments. Invalid
    /// values are silently ignored (previous values are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(format) = std::env::var("ORACLE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = crate::api::normalize_base_url(&self.server.base_url) {
            return Err(ConfigError::Validation {
                field: "server.base_url".to_string(),
                message: e.to_string(),
            });
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "server.request_timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }

        if self.monitor.render_interval_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "monitor.render_interval_seconds".to_string(),
                message: "render interval must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_console_config_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.server.request_timeout_seconds, 10);
        assert_eq!(config.monitor.refresh_interval_seconds, 30);
        assert_eq!(config.monitor.log_capacity(), None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_minimal_toml() {
        let toml = r#"
        [monitor]
        refresh_interval_seconds = 5
        "#;

        let config: ConsoleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.monitor.refresh_interval_seconds, 5);
        assert_eq!(config.monitor.render_interval_seconds, 1); // Default
        assert_eq!(config.server.base_url, "http://127.0.0.1:8080"); // Default
    }

    #[test]
    fn test_config_parse_example_toml() {
        let toml = include_str!("../../oracle.example.toml");
        let config: ConsoleConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            "[server]\nbase_url = \"http://10.0.0.5:9000\"\n[monitor]\nlog_capacity = 50",
        )
        .unwrap();

        let config = ConsoleConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.server.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.monitor.log_capacity(), Some(50));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server\nbase_url =").unwrap();

        let result = ConsoleConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = ConsoleConfig::load(Some(Path::new("/nonexistent/oracle.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_load_none_returns_defaults() {
        let config = ConsoleConfig::load(None).unwrap();
        assert_eq!(config.server.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_env_leaves_flag_backed_settings_alone() {
        std::env::set_var("ORACLE_LOG_LEVEL", "trace");
        let config = ConsoleConfig::default().with_env_overrides();
        std::env::remove_var("ORACLE_LOG_LEVEL");

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_env_override_log_format() {
        std::env::set_var("ORACLE_LOG_FORMAT", "json");
        let config = ConsoleConfig::default().with_env_overrides();
        assert_eq!(config.logging.format, LogFormat::Json);

        // Invalid format keeps default
        std::env::set_var("ORACLE_LOG_FORMAT", "xml");
        let config = ConsoleConfig::default().with_env_overrides();
        std::env::remove_var("ORACLE_LOG_FORMAT");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_validation_bad_url() {
        let mut config = ConsoleConfig::default();
        config.server.base_url = "ftp://oracle".to_string();

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "server.base_url"
        ));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = ConsoleConfig::default();
        config.server.request_timeout_seconds = 0;

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "server.request_timeout_seconds"
        ));
    }

    #[test]
    fn test_config_validation_zero_render_interval() {
        let mut config = ConsoleConfig::default();
        config.monitor.render_interval_seconds = 0;
        assert!(config.validate().is_err());
    }
}
