// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the installer

use asset_graph::AssetError;
use thiserror::Error;

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, InstallerError>;

/// Errors that can occur while driving an installer run
#[derive(Error, Debug)]
pub enum InstallerError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration contents
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Asset resolution or materialization failed
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}
