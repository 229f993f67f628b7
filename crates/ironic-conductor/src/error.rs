//! Error types for the conductor charm.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or installing boot assets.
#[derive(Debug, Error)]
pub enum CharmError {
    /// A file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration document is malformed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// A boot binary expected from a package is not on disk.
    #[error("Missing required file {}. Package not installed?", .0.display())]
    MissingResource(PathBuf),

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External command exited unsuccessfully.
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },
}
