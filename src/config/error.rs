//! Configuration loading errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file or directory could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file did not hold the expected JSON document
    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration path is neither a file nor a directory
    #[error("Configuration path not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The transition directory holds no rule files
    #[error("No transition files in {}", .0.display())]
    NoTransitions(PathBuf),
}
