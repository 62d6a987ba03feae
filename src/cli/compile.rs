use std::path::PathBuf;

use clap::Args;
use ksc::config::Selector;
use ksc::discover::{self, InputOptions};
use ksc::pipeline;

use super::{current_dir, engine};

#[derive(Args)]
pub struct CompileArgs {
    /// Script file or directory to compile (default: the project)
    #[arg(short, long, default_value = ".")]
    pub input: PathBuf,
    /// Output file or directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
    /// Volume to compile: "all", an index or a name
    #[arg(short = 'v', long, default_value = "all")]
    pub volume: Selector,
}

impl CompileArgs {
    pub fn options(&self) -> InputOptions {
        InputOptions {
            input: self.input.clone(),
            output: self.output.clone(),
            volume: self.volume.clone(),
        }
    }
}

pub fn cmd_compile(args: CompileArgs) -> ksc::Result<()> {
    let cwd = current_dir()?;
    let scope = discover::resolve_scope(&args.options(), &cwd)?;
    let mut set = discover::discover(&scope)?;
    if set.is_empty() {
        return Err(ksc::Error::NoScripts);
    }
    let engine = engine()?;
    pipeline::build(&engine, &mut set)?.into_result()?;
    Ok(())
}
