//! `xgo build`: instrumented build through a private, patched toolchain.
//!
//! Orchestrates the pipeline:
//! 1. Resolve the toolchain and check its version
//! 2. Sync the toolchain into its private instance
//! 3. Apply the patch set
//! 4. Build the patched compiler and compare its build identity
//! 5. Install the tool-interception executable
//! 6. Run `go build -toolexec=...` from the instance, forcing `-a` when
//!    the compiler changed
//!
//! The underlying build's exit code is returned unchanged.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};
use xgo_cache::atomic::copy_atomic;
use xgo_cache::{BuildIdRecord, SourceHasher};
use xgo_config::{load_settings, InstanceLayout, XgoHome};
use xgo_toolchain::{
    build_compiler, go_bin, go_version, patch_env_with_goroot, version_file, PatchSet,
    ToolchainSnapshot,
};

use crate::exec_tool::{COMPILER_BIN_ENV, DEBUG_VSCODE_ENV};
use crate::log_tail::LogTail;
use crate::{BuildArgs, GlobalArgs};

/// Runs the `xgo build` command against the resolved cache root.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let home = XgoHome::resolve()?;
    build_with_home(args, global, &home)
}

/// Runs `xgo build` with an explicit cache root.
///
/// Nothing is written under the cache root before the toolchain version has
/// been accepted.
pub fn build_with_home(
    args: &BuildArgs,
    global: &GlobalArgs,
    home: &XgoHome,
) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = load_settings(home.root())?;

    let goroot = resolve_goroot(
        args.with_goroot.as_deref(),
        settings.toolchain.goroot.as_deref(),
    )?;
    let vscode = resolve_vscode(args.vscode.as_deref())?;

    let version = go_version(&goroot)?;
    version.require_supported()?;
    let instance = home.instance(&version, &goroot)?;
    let patch_src = home.patch_source(args.xgo_src.as_deref(), settings.patch.source.as_deref())?;

    home.ensure_dirs()?;
    instance.ensure_dir()?;
    info!(
        goroot = %goroot.display(),
        instance = %instance.dir.display(),
        "using private toolchain instance"
    );

    let _tail = if args.verbose {
        Some(LogTail::spawn(&home.compile_log(), std::io::stdout())?)
    } else {
        None
    };

    if !global.quiet {
        eprintln!("   Syncing {} ({version})", goroot.display());
    }
    let synced = ToolchainSnapshot::new().sync(&goroot, &instance.goroot)?;
    debug!(?synced, "snapshot synced");
    if let Some(recorded) = version_file(&instance.goroot) {
        if recorded != version {
            warn!(expected = %version, actual = %recorded, "snapshot VERSION differs from toolchain");
        }
    }

    let patched = PatchSet::standard().apply(&instance.goroot, &patch_src)?;
    if !global.quiet && patched.written > 0 {
        eprintln!("  Patching {} files from {}", patched.written, patch_src.display());
    }

    if !global.quiet {
        eprintln!(" Compiling patched compiler");
    }
    build_compiler(&instance.goroot, &instance.compiler_bin)?;
    let compiler_changed = BuildIdRecord::new(&instance.compiler_build_id)
        .compare_and_update(&instance.compiler_bin)?;
    if compiler_changed {
        info!("compiler build identity changed, forcing full rebuild");
    }

    let exec_tool = home.exec_tool_bin();
    install_exec_tool(&std::env::current_exe()?, &exec_tool)?;

    let output = match (&args.output, &args.project_dir) {
        (Some(out), Some(_)) => Some(absolute(out)?),
        (out, None) => out.clone(),
        (None, _) => None,
    };
    let plan = UnderlyingBuild {
        exec_tool: &exec_tool,
        debug: args.debug.as_deref(),
        force: args.force || compiler_changed,
        output: output.as_deref(),
        extra_flags: &settings.build.flags,
        args: &args.args,
        vscode: vscode.as_deref(),
        project_dir: args.project_dir.as_deref(),
    };

    if !global.quiet {
        eprintln!("  Building {}", plan.args.join(" "));
    }
    let mut cmd = plan.command(&instance);
    debug!(command = ?cmd, "running underlying build");
    let status = cmd
        .status()
        .map_err(|e| format!("failed to run {}: {e}", go_bin(&instance.goroot).display()))?;

    Ok(status.code().unwrap_or(1))
}

/// Everything the final `go build` invocation depends on.
struct UnderlyingBuild<'a> {
    exec_tool: &'a Path,
    debug: Option<&'a str>,
    force: bool,
    output: Option<&'a Path>,
    extra_flags: &'a [String],
    args: &'a [String],
    vscode: Option<&'a Path>,
    project_dir: Option<&'a Path>,
}

impl UnderlyingBuild<'_> {
    /// The `-toolexec` value routing every tool through `xgo exec-tool`.
    fn toolexec(&self) -> String {
        let mut parts = vec![
            self.exec_tool.display().to_string(),
            "exec-tool".to_string(),
            "--enable".to_string(),
        ];
        if let Some(pkg) = self.debug {
            parts.push(format!("--debug={pkg}"));
        }
        // marks the end of exec-tool's own flags
        parts.push("--".to_string());
        parts.join(" ")
    }

    fn command(&self, instance: &InstanceLayout) -> Command {
        let mut cmd = Command::new(go_bin(&instance.goroot));
        cmd.arg("build").arg(format!("-toolexec={}", self.toolexec()));
        if self.force {
            cmd.arg("-a");
        }
        if let Some(out) = self.output {
            cmd.arg("-o").arg(out);
        }
        cmd.args(self.extra_flags).args(self.args);

        cmd.env("GOCACHE", &instance.build_cache);
        patch_env_with_goroot(&mut cmd, &instance.goroot);
        if let Some(dir) = self.vscode {
            cmd.env(DEBUG_VSCODE_ENV, dir);
        }
        cmd.env(COMPILER_BIN_ENV, &instance.compiler_bin);
        if let Some(dir) = self.project_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Picks the toolchain root: `--with-goroot`, then `config.toml`, then
/// `$GOROOT`, then whatever `go env GOROOT` reports.
fn resolve_goroot(
    cli: Option<&Path>,
    settings: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(root) = cli.or(settings) {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = std::env::var_os("GOROOT").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let output = Command::new("go").args(["env", "GOROOT"]).output();
    match output {
        Ok(out) if out.status.success() => {
            let root = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if !root.is_empty() {
                return Ok(PathBuf::from(root));
            }
        }
        Ok(_) => {}
        Err(e) => debug!("go env GOROOT: {e}"),
    }
    Err("requires GOROOT or --with-goroot".into())
}

/// The editor directory: the given one, or `./.vscode` when it exists;
/// always absolute.
fn resolve_vscode(given: Option<&Path>) -> std::io::Result<Option<PathBuf>> {
    let dir = match given {
        Some(dir) => dir.to_path_buf(),
        None if Path::new(".vscode").is_dir() => PathBuf::from(".vscode"),
        None => return Ok(None),
    };
    absolute(&dir).map(Some)
}

fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Installs `source` (the running `xgo`) as the interception executable,
/// skipping the copy when the installed one is identical.
fn install_exec_tool(source: &Path, target: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    if target.is_file() && SourceHasher::hash_file(target)? == SourceHasher::hash_file(source)? {
        return Ok(false);
    }
    debug!(target = %target.display(), "installing exec tool");
    copy_atomic(source, target)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{OsStr, OsString};

    fn layout() -> InstanceLayout {
        XgoHome::from_root("/h/.xgo")
            .instance(&xgo_common::GoVersion::new(1, 20, 3), Path::new("/usr/local/go"))
            .unwrap()
    }

    fn env_of(cmd: &Command, key: &str) -> Option<OsString> {
        cmd.get_envs()
            .find(|(k, _)| *k == OsStr::new(key))
            .and_then(|(_, v)| v.map(|v| v.to_os_string()))
    }

    fn plan<'a>(exec_tool: &'a Path, args: &'a [String]) -> UnderlyingBuild<'a> {
        UnderlyingBuild {
            exec_tool,
            debug: None,
            force: false,
            output: None,
            extra_flags: &[],
            args,
            vscode: None,
            project_dir: None,
        }
    }

    #[test]
    fn toolexec_value() {
        let exec = Path::new("/h/.xgo/bin/exec_tool");
        let mut p = plan(exec, &[]);
        assert_eq!(p.toolexec(), "/h/.xgo/bin/exec_tool exec-tool --enable --");
        p.debug = Some("example.com/app");
        assert_eq!(
            p.toolexec(),
            "/h/.xgo/bin/exec_tool exec-tool --enable --debug=example.com/app --"
        );
    }

    #[test]
    fn command_shape() {
        let instance = layout();
        let exec = Path::new("/h/.xgo/bin/exec_tool");
        let user = vec!["./cmd/app".to_string()];
        let extra = vec!["-trimpath".to_string()];
        let mut p = plan(exec, &user);
        p.force = true;
        p.output = Some(Path::new("/abs/app"));
        p.extra_flags = &extra;
        p.vscode = Some(Path::new("/proj/.vscode"));

        let cmd = p.command(&instance);
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("build"),
                OsStr::new("-toolexec=/h/.xgo/bin/exec_tool exec-tool --enable --"),
                OsStr::new("-a"),
                OsStr::new("-o"),
                OsStr::new("/abs/app"),
                OsStr::new("-trimpath"),
                OsStr::new("./cmd/app"),
            ]
        );
        assert_eq!(cmd.get_program(), go_bin(&instance.goroot).as_os_str());
        assert_eq!(env_of(&cmd, "GOCACHE"), Some(instance.build_cache.clone().into()));
        assert_eq!(env_of(&cmd, "GOROOT"), Some(instance.goroot.clone().into()));
        assert_eq!(
            env_of(&cmd, COMPILER_BIN_ENV),
            Some(instance.compiler_bin.clone().into())
        );
        assert_eq!(env_of(&cmd, DEBUG_VSCODE_ENV), Some(OsString::from("/proj/.vscode")));
    }

    #[test]
    fn no_force_no_vscode() {
        let instance = layout();
        let exec = Path::new("/x/exec_tool");
        let cmd = plan(exec, &[]).command(&instance);
        assert!(!cmd.get_args().any(|a| a == "-a"));
        assert_eq!(env_of(&cmd, DEBUG_VSCODE_ENV), None);
        assert_eq!(cmd.get_current_dir(), None);
    }

    #[test]
    fn goroot_precedence() {
        assert_eq!(
            resolve_goroot(Some(Path::new("/cli")), Some(Path::new("/cfg"))).unwrap(),
            PathBuf::from("/cli")
        );
        assert_eq!(
            resolve_goroot(None, Some(Path::new("/cfg"))).unwrap(),
            PathBuf::from("/cfg")
        );
    }

    #[test]
    fn explicit_vscode_is_made_absolute() {
        let dir = resolve_vscode(Some(Path::new("editor"))).unwrap().unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("editor"));
    }

    #[test]
    fn exec_tool_install_is_skipped_when_identical() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("xgo");
        let dst = dir.path().join("bin/exec_tool");
        std::fs::write(&src, b"binary v1").unwrap();
        assert!(install_exec_tool(&src, &dst).unwrap());
        assert!(!install_exec_tool(&src, &dst).unwrap());
        std::fs::write(&src, b"binary v2").unwrap();
        assert!(install_exec_tool(&src, &dst).unwrap());
        assert_eq!(std::fs::read(&dst).unwrap(), b"binary v2");
    }

    #[cfg(unix)]
    mod pipeline {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;

        struct Fixture {
            _dir: tempfile::TempDir,
            goroot: PathBuf,
            patch_src: PathBuf,
            home: XgoHome,
            calls: PathBuf,
        }

        fn write(root: &Path, rel: &str, content: &str) {
            let p = root.join(rel);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, content).unwrap();
        }

        /// A toolchain whose `go` reports `version_line`, records every
        /// invocation and writes a fixed compiler binary for `-o`.
        fn fixture(version_line: &str) -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let goroot = dir.path().join("go");
            let calls = dir.path().join("calls.log");
            let script = format!(
                r#"#!/bin/sh
if [ "$1" = "version" ]; then echo "{version_line}"; exit 0; fi
echo "$@" >> "{calls}"
echo "env GOCACHE=$GOCACHE XGO_COMPILER_BIN=$XGO_COMPILER_BIN" >> "{calls}"
for a in "$@"; do if [ "$a" = "fail-me" ]; then exit 3; fi; done
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then echo compiled > "$2"; fi
  shift
done
exit 0
"#,
                calls = calls.display()
            );
            write(&goroot, "bin/go", &script);
            std::fs::set_permissions(goroot.join("bin/go"), std::fs::Permissions::from_mode(0o755))
                .unwrap();
            write(&goroot, "src/cmd/compile/main.go", "package main\n");
            write(&goroot, "src/runtime/proc.go", "package runtime\n");

            let patch_src = dir.path().join("xgo-src");
            write(&patch_src, "patch/link_name.go", "package patch\n");
            write(&patch_src, "compile/noder_hook.go", "package noder\n");
            write(&patch_src, "runtime/xgo_trap.go", "package runtime\n");
            write(&patch_src, "testing/xgo_test_start.go", "package testing\n");

            let home = XgoHome::from_root(dir.path().join("home"));
            Fixture {
                _dir: dir,
                goroot,
                patch_src,
                home,
                calls,
            }
        }

        fn args(fx: &Fixture, user: &[&str]) -> BuildArgs {
            BuildArgs {
                with_goroot: Some(fx.goroot.clone()),
                xgo_src: Some(fx.patch_src.clone()),
                vscode: Some(fx.home.root().join("vscode")),
                args: user.iter().map(|s| s.to_string()).collect(),
                ..BuildArgs::default()
            }
        }

        fn build_lines(fx: &Fixture) -> Vec<String> {
            std::fs::read_to_string(&fx.calls)
                .unwrap()
                .lines()
                .filter(|l| l.starts_with("build -toolexec="))
                .map(String::from)
                .collect()
        }

        const QUIET: GlobalArgs = GlobalArgs { quiet: true };

        #[test]
        fn first_build_forces_rebuild_second_does_not() {
            let fx = fixture("go version go1.20.3 linux/amd64");
            let code = build_with_home(&args(&fx, &["./cmd/app"]), &QUIET, &fx.home).unwrap();
            assert_eq!(code, 0);
            let code = build_with_home(&args(&fx, &["./cmd/app"]), &QUIET, &fx.home).unwrap();
            assert_eq!(code, 0);

            let calls = std::fs::read_to_string(&fx.calls).unwrap();
            assert!(calls.contains("build -gcflags=all=-N -l -o"));

            let builds = build_lines(&fx);
            assert_eq!(builds.len(), 2);
            assert!(builds[0].split(' ').any(|a| a == "-a"), "{}", builds[0]);
            assert!(!builds[1].split(' ').any(|a| a == "-a"), "{}", builds[1]);
            assert!(builds[1].ends_with("./cmd/app"));
            assert!(builds[0].contains("exec-tool --enable --"));

            let instance = fx
                .home
                .instance(&xgo_common::GoVersion::new(1, 20, 3), &fx.goroot)
                .unwrap();
            assert!(instance.goroot.join("src/runtime/xgo_trap.go").is_file());
            assert!(instance.compiler_build_id.is_file());
            assert!(fx.home.exec_tool_bin().is_file());
            assert!(calls.contains(&format!(
                "XGO_COMPILER_BIN={}",
                instance.compiler_bin.display()
            )));
            assert!(calls.contains(&format!("GOCACHE={}", instance.build_cache.display())));
        }

        #[test]
        fn explicit_force_flag() {
            let fx = fixture("go version go1.20.3 linux/amd64");
            build_with_home(&args(&fx, &["."]), &QUIET, &fx.home).unwrap();
            let mut forced = args(&fx, &["."]);
            forced.force = true;
            build_with_home(&forced, &QUIET, &fx.home).unwrap();
            let builds = build_lines(&fx);
            assert!(builds[1].split(' ').any(|a| a == "-a"));
        }

        #[test]
        fn underlying_exit_code_is_passed_through() {
            let fx = fixture("go version go1.20.3 linux/amd64");
            let code = build_with_home(&args(&fx, &["fail-me"]), &QUIET, &fx.home).unwrap();
            assert_eq!(code, 3);
        }

        #[test]
        fn unsupported_version_touches_nothing() {
            let fx = fixture("go version go1.21.0 linux/amd64");
            let err = build_with_home(&args(&fx, &["."]), &QUIET, &fx.home).unwrap_err();
            assert_eq!(err.to_string(), "expect go1.20.x, actual: go1.21.0");
            assert!(!fx.home.root().exists());
            assert!(!fx.calls.exists());
        }

        #[test]
        fn missing_patch_source_is_fatal() {
            let fx = fixture("go version go1.20.3 linux/amd64");
            std::fs::remove_file(fx.patch_src.join("runtime/xgo_trap.go")).unwrap();
            let err = build_with_home(&args(&fx, &["."]), &QUIET, &fx.home).unwrap_err();
            assert!(err.to_string().contains("missing patch source"), "{err}");
            assert!(!fx.calls.exists(), "no build may run");
        }
    }
}
