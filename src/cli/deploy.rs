use clap::Args;
use ksc::config::{Project, Selector};
use ksc::deploy::{self, DeployRequest};

use super::{current_dir, engine};

#[derive(Args)]
pub struct DeployArgs {
    /// Volume to deploy: "all", an index or a name
    #[arg(short = 'v', long, default_value = "all")]
    pub volume: Selector,
    /// Copy sources without compiling
    #[arg(short, long)]
    pub sources: bool,
}

pub fn cmd_deploy(args: DeployArgs) -> ksc::Result<()> {
    let project = Project::locate(&current_dir()?)?;
    let engine = engine()?;
    let request = DeployRequest {
        selector: args.volume,
        sources_only: args.sources,
    };
    deploy::deploy(&engine, &project, &request)?;
    Ok(())
}
