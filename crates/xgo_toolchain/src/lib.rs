//! Private, patchable copies of a Go toolchain.
//!
//! The pipeline never mutates an installed toolchain. Instead it
//! [`sync`](snapshot::ToolchainSnapshot::sync)s the installation into a
//! private instance, applies the fixed [`PatchSet`] that adds the hook entry
//! points, and builds the patched compiler out of that instance with
//! [`build_compiler`].

#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod go_cmd;
pub mod patch;
pub mod snapshot;

pub use compiler::{build_compiler, compiler_command, COMPILER_GCFLAGS};
pub use error::ToolchainError;
pub use go_cmd::{go_bin, go_version, patch_env_with_goroot, run_inherited, version_file};
pub use patch::{PatchEntry, PatchReport, PatchSet};
pub use snapshot::{manifest_path_for, SyncReport, ToolchainSnapshot};
