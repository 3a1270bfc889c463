//! Error types for snapshot, patch, and toolchain command stages.

use std::path::PathBuf;
use std::process::ExitStatus;

use xgo_cache::CacheError;
use xgo_common::VersionError;

/// Errors that can occur while preparing or building a private toolchain.
///
/// Every stage is idempotent, so none of these require cleanup: rerunning
/// the pipeline retries from whatever state was last written.
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// An I/O error occurred at the given path.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Reading or writing cache bookkeeping failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Walking the source tree failed.
    #[error("walking toolchain tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A file or directory required by the patch set is missing.
    #[error("missing patch source {}", .path.display())]
    MissingPatchSource {
        /// The missing path inside the patch source root.
        path: PathBuf,
    },

    /// A child process could not be started.
    #[error("failed to run {}: {source}", .program.display())]
    Spawn {
        /// The program that failed to start.
        program: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A child process exited unsuccessfully.
    #[error("{what} failed: {status}")]
    CommandFailed {
        /// Short description of the command.
        what: String,
        /// The child's exit status.
        status: ExitStatus,
    },

    /// The toolchain version could not be read or is unsupported.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The source tree contains a symlink and this platform cannot create one.
    #[error("cannot recreate symlink {} on this platform", .path.display())]
    UnsupportedSymlink {
        /// The symlink's path.
        path: PathBuf,
    },
}

impl ToolchainError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
