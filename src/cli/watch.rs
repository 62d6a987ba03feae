use ksc::discover;
use ksc::watch::{self, Debouncer};

use super::compile::CompileArgs;
use super::{current_dir, engine};

pub fn cmd_watch(args: CompileArgs) -> ksc::Result<()> {
    let cwd = current_dir()?;
    let scope = match discover::resolve_scope(&args.options(), &cwd) {
        Ok(scope) => scope,
        Err(ksc::Error::ConfigurationMissing { searched }) => {
            tracing::warn!("no ksc.toml found, watching '{}' as a directory", searched.display());
            discover::Scope::Paths {
                input: searched.clone(),
                output: searched,
            }
        }
        Err(e) => return Err(e),
    };
    let engine = engine()?;
    watch::watch(&engine, &scope, Debouncer::default())
}
