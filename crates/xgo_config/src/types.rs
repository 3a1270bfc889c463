//! Settings types deserialized from `<cache-root>/config.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// User defaults read from `config.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Toolchain selection.
    #[serde(default)]
    pub toolchain: ToolchainSettings,
    /// Patch source location.
    #[serde(default)]
    pub patch: PatchSettings,
    /// Extra flags for the underlying `go build`.
    #[serde(default)]
    pub build: BuildSettings,
}

/// The `[toolchain]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainSettings {
    /// GOROOT used when `--with-goroot` is not given.
    pub goroot: Option<PathBuf>,
}

/// The `[patch]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSettings {
    /// Patch source used instead of `<cache-root>/src`.
    pub source: Option<PathBuf>,
}

/// The `[build]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// Flags inserted before the user's own build arguments.
    #[serde(default)]
    pub flags: Vec<String>,
}
