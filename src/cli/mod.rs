pub mod compile;
pub mod deploy;
pub mod init;
pub mod run;
pub mod watch;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ksc::engine::ProcessEngine;

#[derive(Parser)]
#[command(
    name = "ksc",
    version,
    about = "Build, watch, deploy and run Kerboscript projects"
)]
pub struct Cli {
    /// Show debug output
    #[arg(long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create ksc.toml and the default directories
    Init(init::InitArgs),
    /// Compile scripts of a project, a directory or a single file
    Compile(compile::CompileArgs),
    /// Compile, then recompile whenever a script changes
    Watch(compile::CompileArgs),
    /// Compile and copy the output into the archive
    Deploy(deploy::DeployArgs),
    /// Run a script file or a script from ksc.toml
    Run(run::RunArgs),
}

/// Parse `args` (including the program name) and execute the command.
///
/// Used by `main` and by `ksc ...` steps of composite scripts.
pub fn dispatch<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => execute(cli),
        Err(e) => usage_error(e),
    }
}

/// Print a clap error. Help and version exit with 0, usage errors with 1.
pub fn usage_error(e: clap::Error) -> i32 {
    let _ = e.print();
    if e.use_stderr() {
        1
    } else {
        0
    }
}

/// Execute an already parsed command line and return the exit code.
pub fn execute(cli: Cli) -> i32 {
    let result = match cli.command {
        Command::Init(args) => init::cmd_init(args),
        Command::Compile(args) => compile::cmd_compile(args),
        Command::Watch(args) => watch::cmd_watch(args),
        Command::Deploy(args) => deploy::cmd_deploy(args),
        Command::Run(args) => run::cmd_run(args),
    };
    match result {
        Ok(()) => 0,
        Err(e) => {
            e.report();
            e.exit_code()
        }
    }
}

pub fn current_dir() -> ksc::Result<PathBuf> {
    std::env::current_dir().map_err(|e| ksc::Error::persistence(".", e))
}

pub fn engine() -> ksc::Result<ProcessEngine> {
    let engine = ProcessEngine::locate()?;
    tracing::debug!("using engine {}", engine.program().display());
    Ok(engine)
}
