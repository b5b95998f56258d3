// SPDX-License-Identifier: AGPL-3.0-or-later
//! Driver configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InstallerError, Result};

/// Main configuration structure for the installer driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Installer instance name
    pub name: String,

    /// Version of the configuration format
    #[serde(default = "default_version")]
    pub version: String,

    /// Directory generated files are written to and restored from
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Install config handed to the graph; when absent on disk the
    /// install config is restored from the output directory instead
    #[serde(default = "default_install_config")]
    pub install_config: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "installer".to_string(),
            version: default_version(),
            output_dir: default_output_dir(),
            install_config: default_install_config(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a TOML file; a missing file is `ConfigNotFound`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(InstallerError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(InstallerError::InvalidConfig {
                message: "Installer name cannot be empty".to_string(),
            });
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(InstallerError::InvalidConfig {
                message: "output_dir cannot be empty".to_string(),
            });
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(InstallerError::InvalidConfig {
                message: format!("Unknown log format '{}'", self.logging.format),
            });
        }

        Ok(())
    }
}

// Default value functions

fn default_version() -> String {
    "1.0".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("cluster")
}

fn default_install_config() -> PathBuf {
    PathBuf::from("install-config.yaml")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.name, "installer");
        assert_eq!(config.output_dir, PathBuf::from("cluster"));
        assert_eq!(config.install_config, PathBuf::from("install-config.yaml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_name() {
        let mut config = Config::default();
        config.name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_output_dir() {
        let mut config = Config::default();
        config.output_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_content = r#"
            name = "lab-installer"
            output_dir = "/tmp/lab"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.name, "lab-installer");
        assert_eq!(config.version, "1.0");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/lab"));
        assert_eq!(config.install_config, PathBuf::from("install-config.yaml"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/installer.toml");
        assert!(matches!(result, Err(InstallerError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_from_file_or_default() {
        let config = Config::from_file_or_default("/nonexistent/installer.toml").unwrap();
        assert_eq!(config.name, "installer");
    }
}
