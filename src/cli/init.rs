use std::path::PathBuf;

use clap::Args;
use ksc::config::scaffold::{self, InitOptions};

#[derive(Args)]
pub struct InitArgs {
    /// Project name (defaults to the directory name)
    pub name: Option<String>,
    /// Parent directory; the project is created in <path>/<name>
    pub path: Option<PathBuf>,
    /// Use defaults and overwrite an existing ksc.toml
    #[arg(short, long)]
    pub yes: bool,
}

pub fn cmd_init(args: InitArgs) -> ksc::Result<()> {
    let options = InitOptions {
        name: args.name,
        path: args.path,
        yes: args.yes,
    };
    let done = scaffold::init_project(&options)?;
    tracing::info!("Created {}", done.config_path.display());
    for path in &done.created {
        tracing::info!("  {}", path.display());
    }
    if done.project.archive.as_os_str().is_empty() {
        tracing::warn!("No installation found; set 'archive' in ksc.toml before deploying.");
    }
    Ok(())
}
