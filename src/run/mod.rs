//! `ksc run`: execute a script file directly, or a named composite script.

pub mod step;

use std::path::{Path, PathBuf};

pub use step::{parse_steps, run_steps, spawn_streaming, Step, StepRunner, PROGRAM_NAME};

use crate::config::Project;
use crate::engine::{self, Engine, Mount};
use crate::error::{Error, Result};
use crate::volume::{VolumePath, VolumeStore, ARCHIVE_INDEX, ARCHIVE_NAME};

/// What `ksc run <script>` refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunTarget {
    File(PathBuf),
    Named(String),
}

impl RunTarget {
    /// An existing file wins over a script name.
    pub fn classify(script: &str, cwd: &Path) -> Self {
        let path = cwd.join(script);
        if path.is_file() {
            RunTarget::File(path)
        } else {
            RunTarget::Named(script.to_string())
        }
    }
}

/// Volumes visible to a directly run script.
///
/// The archive (when configured), every project volume by its source root,
/// and the script's own directory as `ksc` on the next free index.
pub fn mounts(project: Option<&Project>, script_dir: &Path) -> Vec<Mount> {
    let mut mounts = Vec::new();
    if let Some(project) = project {
        if let Some(archive) = project.archive_path() {
            mounts.push(Mount {
                index: ARCHIVE_INDEX,
                name: ARCHIVE_NAME.to_string(),
                root: archive,
            });
        }
        for v in &project.volumes {
            mounts.push(Mount {
                index: v.index,
                name: v.name.clone(),
                root: project.input_root(v),
            });
        }
    }
    let next = mounts.iter().map(|m| m.index + 1).max().unwrap_or(1);
    mounts.push(Mount {
        index: next,
        name: PROGRAM_NAME.to_string(),
        root: script_dir.to_path_buf(),
    });
    mounts
}

/// Compile one file in isolation and run it. Returns the program's output.
pub fn run_file(engine: &dyn Engine, project: Option<&Project>, file: &Path) -> Result<Vec<String>> {
    let dir = file.parent().unwrap_or(Path::new("."));
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let store = VolumeStore::new(PROGRAM_NAME, dir);
    let logical = VolumePath::parse(&name);
    let source = match store.open(&logical, false)?.and_then(|item| item.into_file()) {
        Some(file) => file.read_to_string()?,
        None => return Err(Error::ScriptNotFound(file.display().to_string())),
    };

    let artifact = engine.compile(&logical.to_string(), &source).map_err(|e| {
        tracing::error!("{}", e);
        Error::CompileFailed { count: 1 }
    })?;
    if artifact.is_empty() {
        tracing::info!("{} produced no code, nothing to run", name);
        return Ok(Vec::new());
    }

    let mounts = mounts(project, store.root());
    tracing::debug!("running {} with {} volume(s) mounted", name, mounts.len());
    engine::execute(engine, &mounts, &artifact)
}

/// Run a `[scripts]` entry step by step from the project root.
pub fn run_named(project: &Project, name: &str, runner: &mut dyn StepRunner) -> Result<()> {
    let content = project
        .scripts
        .get(name)
        .ok_or_else(|| Error::ScriptNotFound(name.to_string()))?;
    let steps = parse_steps(content);
    tracing::debug!("script '{}' has {} step(s)", name, steps.len());
    run_steps(&steps, runner, &project.root_dir)
}
