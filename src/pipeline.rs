//! Compiler pipeline: purge, compile everything, write only on full success.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::discover::{self, Purge, Scope, WorkingSet};
use crate::engine::{CompileError, Engine};
use crate::error::{Error, Result};
use crate::volume::COMPILED_EXTENSION;

/// How a build ended.
#[derive(Debug)]
pub enum BuildOutcome {
    /// Nothing to compile; output was left untouched.
    Empty,
    Compiled { count: usize, elapsed: Duration },
    Failed { errors: Vec<CompileError>, elapsed: Duration },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Compiled { .. })
    }

    /// Map to the error a verb returns.
    pub fn into_result(self) -> Result<usize> {
        match self {
            BuildOutcome::Compiled { count, .. } => Ok(count),
            BuildOutcome::Failed { errors, .. } => Err(Error::CompileFailed {
                count: errors.len(),
            }),
            BuildOutcome::Empty => Err(Error::NoScripts),
        }
    }
}

/// Discover and build in one go. The working set is returned with artifacts.
pub fn compile_scope(engine: &dyn Engine, scope: &Scope) -> Result<(BuildOutcome, WorkingSet)> {
    let mut set = discover::discover(scope)?;
    let outcome = build(engine, &mut set)?;
    Ok((outcome, set))
}

/// Run the pipeline over a discovered working set.
pub fn build(engine: &dyn Engine, set: &mut WorkingSet) -> Result<BuildOutcome> {
    if set.is_empty() {
        tracing::warn!("No scripts found.");
        return Ok(BuildOutcome::Empty);
    }

    purge(set)?;

    tracing::info!("Compiling scripts...");
    let start = Instant::now();
    let errors = compile_units(engine, set);

    if !errors.is_empty() {
        for err in &errors {
            tracing::error!("{}", err);
        }
        tracing::error!("Compilation unsuccessful. See error messages above.");
        return Ok(BuildOutcome::Failed {
            errors,
            elapsed: start.elapsed(),
        });
    }

    let count = write_artifacts(set)?;
    let elapsed = start.elapsed();
    tracing::info!("{} script(s) compiled in {} ms", count, elapsed.as_millis());
    Ok(BuildOutcome::Compiled { count, elapsed })
}

/// Remove stale output for every binding.
pub fn purge(set: &WorkingSet) -> Result<()> {
    for binding in &set.volumes {
        let output = &binding.output;
        match &binding.purge {
            Purge::Root => {
                if output.root().exists() {
                    tracing::debug!("purging {}", output.root().display());
                    output.clear()?;
                }
            }
            Purge::File(path) => {
                if output.delete(path, false)? {
                    tracing::debug!("removed {}", path);
                }
            }
            Purge::CompiledOnly => {
                if !output.root().is_dir() {
                    continue;
                }
                for file in output.root_directory().walk_files()? {
                    if file.path.extension() == Some(COMPILED_EXTENSION) {
                        output.delete(&file.path, false)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Compile every unit in parallel. Errors come back in discovery order.
fn compile_units(engine: &dyn Engine, set: &mut WorkingSet) -> Vec<CompileError> {
    let names: Vec<String> = set
        .units
        .iter()
        .map(|u| {
            let binding = set.binding(u);
            match binding.index {
                Some(_) => format!("{}:/{}", binding.name, u.source),
                None => u.source.to_string(),
            }
        })
        .collect();

    let results: Vec<_> = set
        .units
        .par_iter()
        .zip(names.par_iter())
        .map(|(unit, name)| engine.compile(name, &unit.content))
        .collect();

    let mut errors = Vec::new();
    for (unit, result) in set.units.iter_mut().zip(results) {
        match result {
            Ok(artifact) => unit.artifact = Some(artifact),
            Err(err) => errors.push(err),
        }
    }
    errors
}

fn write_artifacts(set: &WorkingSet) -> Result<usize> {
    let mut count = 0;
    for unit in &set.units {
        let Some(artifact) = &unit.artifact else {
            continue;
        };
        let binding = set.binding(unit);
        let file = binding.output.save_file(&unit.output, artifact.bytes())?;
        tracing::debug!("wrote {}", file.real_path.display());
        count += 1;
    }
    Ok(count)
}

