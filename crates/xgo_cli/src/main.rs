//! xgo builds Go programs with a patched compiler that injects runtime
//! hooks into selected functions.
//!
//! `xgo build` prepares a private, patched copy of the toolchain and runs an
//! ordinary `go build` with every compile step routed through the hidden
//! `xgo exec-tool` subcommand.

#![warn(missing_docs)]

mod build;
mod exec_tool;
mod log_tail;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// xgo: test-time function interception for Go.
#[derive(Parser, Debug)]
#[command(name = "xgo", version, about = "Build Go programs with an instrumented compiler")]
pub struct Cli {
    /// Suppress progress output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build packages with the instrumented toolchain.
    Build(BuildArgs),
    /// Compile-step interceptor invoked by `go build -toolexec`.
    #[command(hide = true)]
    ExecTool(ExecToolArgs),
}

/// Arguments for `xgo build`. Anything not listed is passed to `go build`.
#[derive(Parser, Debug, Default)]
pub struct BuildArgs {
    /// Force rebuilding of packages that are already up-to-date.
    #[arg(short = 'a')]
    pub force: bool,

    /// Directory to run the build in.
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Output file; made absolute when `--project-dir` is given.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Debug logging and a live view of the compile log.
    #[arg(short, long)]
    pub verbose: bool,

    /// Patch source root instead of `~/.xgo/src`.
    #[arg(long)]
    pub xgo_src: Option<PathBuf>,

    /// Package whose compile step should be prepared for debugging.
    #[arg(long)]
    pub debug: Option<String>,

    /// Directory receiving debug launch descriptions; defaults to `./.vscode`
    /// when it exists.
    #[arg(long)]
    pub vscode: Option<PathBuf>,

    /// Toolchain root to instrument instead of the default one.
    #[arg(long)]
    pub with_goroot: Option<PathBuf>,

    /// Flags and packages passed through to `go build`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the hidden `xgo exec-tool` subcommand.
#[derive(Parser, Debug)]
pub struct ExecToolArgs {
    /// Substitute the patched compiler for the stock one.
    #[arg(long)]
    pub enable: bool,

    /// Package whose compile step is written out for debugging.
    #[arg(long)]
    pub debug: Option<String>,

    /// The tool path followed by its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub tool: Vec<String>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "xgo=debug" } else { "xgo=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version go to stdout and succeed; usage errors exit 1
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    let verbose = matches!(&cli.command, Command::Build(args) if args.verbose);
    init_tracing(verbose);

    let global = GlobalArgs { quiet: cli.quiet };

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::ExecTool(ref args) => exec_tool::run(args),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
