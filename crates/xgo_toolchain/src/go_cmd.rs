//! Plumbing for running a toolchain's own `go` command.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;
use xgo_common::GoVersion;

use crate::error::ToolchainError;

/// Path of the `go` command inside `goroot`.
pub fn go_bin(goroot: &Path) -> PathBuf {
    goroot
        .join("bin")
        .join(format!("go{}", std::env::consts::EXE_SUFFIX))
}

/// Points `cmd` at `goroot`: sets `GOROOT` and puts `<goroot>/bin` first on
/// `PATH`, so nested `go` invocations resolve to the same toolchain.
pub fn patch_env_with_goroot(cmd: &mut Command, goroot: &Path) {
    let mut paths = vec![goroot.join("bin")];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    let path = std::env::join_paths(paths).unwrap_or_else(|_| OsString::from(goroot.join("bin")));
    cmd.env("GOROOT", goroot).env("PATH", path);
}

/// Runs `go version` from `goroot` and parses the result.
pub fn go_version(goroot: &Path) -> Result<GoVersion, ToolchainError> {
    let program = go_bin(goroot);
    let mut cmd = Command::new(&program);
    cmd.arg("version");
    patch_env_with_goroot(&mut cmd, goroot);
    let output = cmd.output().map_err(|e| ToolchainError::Spawn {
        program: program.clone(),
        source: e,
    })?;
    if !output.status.success() {
        return Err(ToolchainError::CommandFailed {
            what: format!("{} version", program.display()),
            status: output.status,
        });
    }
    let text = String::from_utf8_lossy(&output.stdout);
    debug!(goroot = %goroot.display(), output = %text.trim(), "detected go version");
    Ok(GoVersion::parse_go_version_output(&text)?)
}

/// The version recorded in `<goroot>/VERSION`, when present and parseable.
pub fn version_file(goroot: &Path) -> Option<GoVersion> {
    let text = std::fs::read_to_string(goroot.join("VERSION")).ok()?;
    GoVersion::parse_go_version_output(text.lines().next()?).ok()
}

/// Runs `cmd` with inherited standard streams and fails unless it exits 0.
pub fn run_inherited(cmd: &mut Command, what: &str) -> Result<(), ToolchainError> {
    debug!(command = ?cmd, "running {what}");
    let status = cmd.status().map_err(|e| ToolchainError::Spawn {
        program: PathBuf::from(cmd.get_program()),
        source: e,
    })?;
    if !status.success() {
        return Err(ToolchainError::CommandFailed {
            what: what.to_string(),
            status,
        });
    }
    Ok(())
}
