//! `xgo exec-tool`: the per-tool hook registered with `go build -toolexec`.
//!
//! The go command runs `<exec_tool> exec-tool --enable -- <tool> <args...>`
//! for every tool invocation. Compile steps are redirected to the patched
//! compiler named by `XGO_COMPILER_BIN`; everything else runs unchanged.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, warn};
use xgo_config::XgoHome;

use crate::ExecToolArgs;

/// Path of the patched compiler, set by `xgo build`.
pub const COMPILER_BIN_ENV: &str = "XGO_COMPILER_BIN";
/// Directory receiving debug launch descriptions, set by `xgo build`.
pub const DEBUG_VSCODE_ENV: &str = "XGO_DEBUG_VSCODE";

/// What an editor needs to rerun one compile step under a debugger.
#[derive(Debug, Serialize)]
struct DebugLaunch<'a> {
    package: &'a str,
    program: &'a Path,
    cwd: PathBuf,
    args: &'a [String],
    goroot: Option<String>,
}

/// Runs the `xgo exec-tool` command, returning the tool's exit code.
pub fn run(args: &ExecToolArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let log = match XgoHome::resolve() {
        Ok(home) => Some(home.compile_log()),
        Err(e) => {
            warn!("compile log disabled: {e}");
            None
        }
    };
    run_with_log(args, log.as_deref())
}

fn run_with_log(args: &ExecToolArgs, log: Option<&Path>) -> Result<i32, Box<dyn std::error::Error>> {
    let Some((tool, tool_args)) = args.tool.split_first() else {
        return Err("exec-tool: missing tool".into());
    };
    let tool = Path::new(tool);
    let compiler = std::env::var_os(COMPILER_BIN_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let program = select_program(tool, args.enable, compiler.as_deref());
    let package = package_arg(tool_args);

    if let Some(log) = log {
        if let Err(e) = append_compile_log(log, tool, &program, package) {
            warn!("cannot write compile log: {e}");
        }
    }

    if let (Some(wanted), Some(package)) = (args.debug.as_deref(), package) {
        if wanted == package {
            if let Some(dir) = std::env::var_os(DEBUG_VSCODE_ENV).filter(|v| !v.is_empty()) {
                let written = write_debug_launch(Path::new(&dir), package, &program, tool_args)?;
                debug!(file = %written.display(), "wrote debug launch description");
            }
        }
    }

    let status = Command::new(&program)
        .args(tool_args)
        .status()
        .map_err(|e| format!("failed to run {}: {e}", program.display()))?;
    Ok(status.code().unwrap_or(1))
}

/// The program to run for `tool`: the patched compiler when interception
/// is enabled and the tool is the compiler, `tool` itself otherwise.
fn select_program(tool: &Path, enable: bool, compiler: Option<&Path>) -> PathBuf {
    let is_compile = tool.file_stem().is_some_and(|s| s == "compile");
    match compiler {
        Some(compiler) if enable && is_compile => compiler.to_path_buf(),
        _ => tool.to_path_buf(),
    }
}

/// The value of the compiler's `-p <package>` argument.
fn package_arg(args: &[String]) -> Option<&str> {
    args.windows(2)
        .find(|w| w[0] == "-p")
        .map(|w| w[1].as_str())
}

fn append_compile_log(
    log: &Path,
    tool: &Path,
    program: &Path,
    package: Option<&str>,
) -> std::io::Result<()> {
    if let Some(parent) = log.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let name = tool
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let patched = if program != tool { " (patched)" } else { "" };
    let line = format!("{name} {}{patched}\n", package.unwrap_or("-"));
    // one write per line keeps lines from parallel compiles whole under O_APPEND
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log)?;
    file.write_all(line.as_bytes())
}

/// Writes `<dir>/xgo-debug-<package>.json`, with `/` and other separators in
/// the package path replaced by `_`.
fn write_debug_launch(
    dir: &Path,
    package: &str,
    program: &Path,
    args: &[String],
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let sanitized: String = package
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    let launch = DebugLaunch {
        package,
        program,
        cwd: std::env::current_dir()?,
        args,
        goroot: std::env::var("GOROOT").ok(),
    };
    let path = dir.join(format!("xgo-debug-{sanitized}.json"));
    xgo_cache::atomic::write_atomic(&path, &serde_json::to_vec_pretty(&launch)?)?;
    Ok(path)
}
