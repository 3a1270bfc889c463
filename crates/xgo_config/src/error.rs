//! Error types for configuration loading and layout resolution.

use std::path::PathBuf;

/// Errors that can occur when locating the cache root or reading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the settings file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Neither `XGO_HOME` nor a home directory is available.
    #[error("cannot locate home directory; set XGO_HOME")]
    MissingHome,

    /// A directory the pipeline depends on does not exist.
    #[error("{what} {} is not a directory", .path.display())]
    NotADirectory {
        /// What the directory is for (e.g. "patch source").
        what: &'static str,
        /// The offending path.
        path: PathBuf,
    },

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}
