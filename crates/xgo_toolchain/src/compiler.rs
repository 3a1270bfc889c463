//! Building the patched compiler out of a private instance.

use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::error::ToolchainError;
use crate::go_cmd::{go_bin, patch_env_with_goroot, run_inherited};

/// Optimizations and inlining disabled for every package of the compiler,
/// keeping IR rewrites debuggable.
pub const COMPILER_GCFLAGS: &str = "-gcflags=all=-N -l";

/// Builds the `go build` invocation that compiles `<goroot>/src/cmd/compile`
/// into `output`.
pub fn compiler_command(goroot: &Path, output: &Path) -> Command {
    let mut cmd = Command::new(go_bin(goroot));
    cmd.arg("build")
        .arg(COMPILER_GCFLAGS)
        .arg("-o")
        .arg(output)
        .arg("./")
        .current_dir(goroot.join("src").join("cmd").join("compile"));
    patch_env_with_goroot(&mut cmd, goroot);
    cmd
}

/// Compiles the patched compiler from `goroot` into `output`.
///
/// Output of the toolchain's build is passed through; a non-zero exit is
/// reported as [`ToolchainError::CommandFailed`].
pub fn build_compiler(goroot: &Path, output: &Path) -> Result<(), ToolchainError> {
    info!(goroot = %goroot.display(), output = %output.display(), "building patched compiler");
    run_inherited(&mut compiler_command(goroot, output), "building patched compiler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn command_shape() {
        let cmd = compiler_command(Path::new("/c/go1.20.3"), Path::new("/c/compile"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("build"),
                OsStr::new("-gcflags=all=-N -l"),
                OsStr::new("-o"),
                OsStr::new("/c/compile"),
                OsStr::new("./"),
            ]
        );
        assert_eq!(
            cmd.get_current_dir(),
            Some(Path::new("/c/go1.20.3/src/cmd/compile"))
        );
        assert!(cmd.get_program().to_string_lossy().contains("go1.20.3/bin/go"));
    }

    #[cfg(unix)]
    #[test]
    fn builds_with_fake_toolchain() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let goroot = dir.path().join("go");
        std::fs::create_dir_all(goroot.join("bin")).unwrap();
        std::fs::create_dir_all(goroot.join("src/cmd/compile")).unwrap();
        // writes "compiled" to the path following -o
        let script = "#!/bin/sh\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-o\" ]; then echo compiled > \"$2\"; fi\n  shift\ndone\n";
        std::fs::write(goroot.join("bin/go"), script).unwrap();
        std::fs::set_permissions(goroot.join("bin/go"), std::fs::Permissions::from_mode(0o755))
            .unwrap();

        let out = dir.path().join("compile");
        build_compiler(&goroot, &out).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "compiled\n");
    }
}
