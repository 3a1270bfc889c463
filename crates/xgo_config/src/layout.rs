//! Paths of the private cache root and of each toolchain's private instance.
//!
//! ```text
//! <root>/src                         default patch source
//! <root>/bin/exec_tool               tool-interception executable
//! <root>/log/compile.log             compile log tailed with --verbose
//! <root>/go-instrument/<identity>/
//!     go<M>.<m>.<p>/                 patched toolchain snapshot
//!     go<M>.<m>.<p>.sync.json        snapshot sync manifest (owned by the sync stage)
//!     compile                        patched compiler binary
//!     compile.buildid.txt            recorded build identity
//!     build-cache/                   private GOCACHE
//! ```

use std::path::{Path, PathBuf};

use xgo_common::{path_sum, GoVersion};

use crate::error::ConfigError;

/// Environment variable overriding the cache root.
pub const XGO_HOME_ENV: &str = "XGO_HOME";

/// The private cache root, `~/.xgo` by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XgoHome {
    root: PathBuf,
}

impl XgoHome {
    /// Resolves the cache root from `XGO_HOME` or the user's home directory.
    pub fn resolve() -> Result<Self, ConfigError> {
        if let Some(root) = std::env::var_os(XGO_HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::from_root(PathBuf::from(root)));
        }
        let home = dirs::home_dir().ok_or(ConfigError::MissingHome)?;
        Ok(Self::from_root(home.join(".xgo")))
    }

    /// Uses `root` as the cache root.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default patch source, `<root>/src`.
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Directory holding auxiliary binaries, `<root>/bin`.
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Directory holding the compile log, `<root>/log`.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    /// The tool-interception executable, `<root>/bin/exec_tool`.
    pub fn exec_tool_bin(&self) -> PathBuf {
        self.bin_dir().join("exec_tool")
    }

    /// The shared compile log, `<root>/log/compile.log`.
    pub fn compile_log(&self) -> PathBuf {
        self.log_dir().join("compile.log")
    }

    /// Picks the patch source: an explicit override wins, then the settings
    /// file, then `<root>/src`, which must exist.
    pub fn patch_source(
        &self,
        cli_override: Option<&Path>,
        settings_override: Option<&Path>,
    ) -> Result<PathBuf, ConfigError> {
        if let Some(p) = cli_override.or(settings_override) {
            return Ok(p.to_path_buf());
        }
        let src = self.src_dir();
        if !src.is_dir() {
            return Err(ConfigError::NotADirectory {
                what: "patch source",
                path: src,
            });
        }
        Ok(src)
    }

    /// Creates `bin/` and `log/` under the root.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.bin_dir())?;
        std::fs::create_dir_all(self.log_dir())
    }

    /// Computes the private instance layout for the toolchain at `goroot`.
    ///
    /// The instance directory is named by [`path_sum`] over `goroot` with a
    /// `go<M>.<m>.<p>_` prefix, so installs at different locations or of
    /// different versions never share a directory.
    pub fn instance(&self, version: &GoVersion, goroot: &Path) -> std::io::Result<InstanceLayout> {
        let version_name = version.dir_name();
        let identity = path_sum(&format!("{version_name}_"), goroot)?;
        let dir = self.root.join("go-instrument").join(identity);
        Ok(InstanceLayout {
            goroot: dir.join(&version_name),
            compiler_bin: dir.join("compile"),
            compiler_build_id: dir.join("compile.buildid.txt"),
            build_cache: dir.join("build-cache"),
            version_name,
            dir,
        })
    }
}

/// Every path belonging to one private toolchain instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceLayout {
    /// `<root>/go-instrument/<identity>`.
    pub dir: PathBuf,
    /// `go<M>.<m>.<p>`.
    pub version_name: String,
    /// The writable snapshot of the toolchain tree.
    pub goroot: PathBuf,
    /// The patched compiler binary.
    pub compiler_bin: PathBuf,
    /// Side file holding the compiler's recorded build identity.
    pub compiler_build_id: PathBuf,
    /// Private `GOCACHE` for instrumented builds.
    pub build_cache: PathBuf,
}

impl InstanceLayout {
    /// Creates the instance directory.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_relative_paths() {
        let home = XgoHome::from_root("/h/.xgo");
        assert_eq!(home.src_dir(), PathBuf::from("/h/.xgo/src"));
        assert_eq!(home.exec_tool_bin(), PathBuf::from("/h/.xgo/bin/exec_tool"));
        assert_eq!(home.compile_log(), PathBuf::from("/h/.xgo/log/compile.log"));
    }

    #[test]
    fn instance_layout_shape() {
        let home = XgoHome::from_root("/h/.xgo");
        let layout = home
            .instance(&GoVersion::new(1, 20, 3), Path::new("/nonexistent/go"))
            .unwrap();
        let name = layout.dir.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("go1.20.3_"));
        assert!(layout.dir.starts_with("/h/.xgo/go-instrument"));
        assert_eq!(layout.goroot, layout.dir.join("go1.20.3"));
        assert_eq!(layout.compiler_bin, layout.dir.join("compile"));
        assert_eq!(
            layout.compiler_build_id,
            layout.dir.join("compile.buildid.txt")
        );
        assert_eq!(layout.build_cache, layout.dir.join("build-cache"));
    }

    #[test]
    fn distinct_goroots_get_distinct_instances() {
        let home = XgoHome::from_root("/h/.xgo");
        let v = GoVersion::new(1, 20, 3);
        let a = home.instance(&v, Path::new("/opt/go-a")).unwrap();
        let b = home.instance(&v, Path::new("/opt/go-b")).unwrap();
        assert_ne!(a.dir, b.dir);
    }

    #[test]
    fn patch_source_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let home = XgoHome::from_root(dir.path());
        let cli = PathBuf::from("/cli/src");
        let cfg = PathBuf::from("/cfg/src");
        assert_eq!(
            home.patch_source(Some(&cli), Some(&cfg)).unwrap(),
            cli
        );
        assert_eq!(home.patch_source(None, Some(&cfg)).unwrap(), cfg);
    }

    #[test]
    fn default_patch_source_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let home = XgoHome::from_root(dir.path());
        let err = home.patch_source(None, None).unwrap_err();
        assert!(matches!(err, ConfigError::NotADirectory { .. }));

        std::fs::create_dir_all(home.src_dir()).unwrap();
        assert_eq!(home.patch_source(None, None).unwrap(), home.src_dir());
    }

    #[test]
    fn ensure_dirs_creates_bin_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let home = XgoHome::from_root(dir.path().join(".xgo"));
        home.ensure_dirs().unwrap();
        assert!(home.bin_dir().is_dir());
        assert!(home.log_dir().is_dir());
    }
}
