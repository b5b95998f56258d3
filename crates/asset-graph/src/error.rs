// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for asset resolution

use std::fmt;

use thiserror::Error;

use crate::asset::AssetId;

/// Result type alias for asset-graph operations
pub type Result<T> = std::result::Result<T, AssetError>;

/// The step of a producer's lifecycle that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Repopulating from persisted files
    Restore,
    /// Computing the value from resolved dependencies
    Synthesize,
}

impl fmt::Display for Step {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Restore => write!(formatter, "restore"),
            Step::Synthesize => write!(formatter, "synthesize"),
        }
    }
}

/// Errors that can occur while resolving or materializing assets
#[derive(Error, Debug)]
pub enum AssetError {
    /// A declared dependency has no registered producer
    #[error("No producer registered for '{id}' (required by '{required_by}')")]
    MissingProducer { id: AssetId, required_by: AssetId },

    /// The dependency graph contains a cycle
    #[error("Dependency cycle detected: {}", format_cycle(.path))]
    Cycle { path: Vec<AssetId> },

    /// Two producers were registered under the same identity
    #[error("Producer '{id}' registered more than once")]
    DuplicateProducer { id: AssetId },

    /// Two files in one output set share a path
    #[error("Duplicate file path in output set: {path}")]
    DuplicateFile { path: String },

    /// Upstream data is absent or malformed
    #[error("Failed to synthesize '{asset}': {message}")]
    Synthesis { asset: AssetId, message: String },

    /// The base configuration could not be serialized after redaction
    #[error("Failed to redact '{asset}': {message}")]
    Redaction { asset: AssetId, message: String },

    /// A template placeholder did not resolve, or the template is malformed
    #[error("Failed to bind template '{file}': {message}")]
    Binding { file: String, message: String },

    /// A persisted file exists but cannot be parsed
    #[error("Invalid persisted state in '{path}': {message}")]
    PersistedState { path: String, message: String },

    /// Failure raised by a producer, tagged with its identity and step
    #[error("{step} of '{asset}' failed: {source}")]
    Step {
        asset: AssetId,
        step: Step,
        #[source]
        source: Box<AssetError>,
    },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AssetError {
    /// Shorthand for a synthesis failure
    pub fn synthesis(asset: AssetId, message: impl Into<String>) -> Self {
        AssetError::Synthesis {
            asset,
            message: message.into(),
        }
    }

    /// Shorthand for a persisted-state failure
    pub fn persisted(path: impl Into<String>, message: impl ToString) -> Self {
        AssetError::PersistedState {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// The innermost error, with every `Step` wrapper removed
    pub fn root_cause(&self) -> &AssetError {
        let mut current = self;
        while let AssetError::Step { source, .. } = current {
            current = source.as_ref();
        }
        current
    }
}

fn format_cycle(path: &[AssetId]) -> String {
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_steps() {
        let inner = AssetError::synthesis(AssetId::new("tls/root-ca"), "never generated");
        let wrapped = AssetError::Step {
            asset: AssetId::new("manifests"),
            step: Step::Synthesize,
            source: Box::new(AssetError::Step {
                asset: AssetId::new("tls/root-ca"),
                step: Step::Synthesize,
                source: Box::new(inner),
            }),
        };

        assert!(matches!(
            wrapped.root_cause(),
            AssetError::Synthesis { message, .. } if message == "never generated"
        ));
    }

    #[test]
    fn test_cycle_display() {
        let error = AssetError::Cycle {
            path: vec![AssetId::new("a"), AssetId::new("b"), AssetId::new("a")],
        };
        assert_eq!(error.to_string(), "Dependency cycle detected: a -> b -> a");
    }
}
