//! Deployment: compile, then mirror each volume into the archive.
//!
//! The archive is the deployment root, usually `Ships/Script` of a game
//! installation. Every project volume with a `deploy` path owns that
//! directory inside the archive: it is cleaned and refilled on each deploy.
//! A volume deployed to the archive root only removes the root's own files,
//! so other volumes' directories survive.

use std::time::{Duration, Instant};

use crate::config::{Project, Selector};
use crate::discover::{self, Scope, VolumeBinding, WorkingSet};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::pipeline;
use crate::volume::{VolumePath, VolumeStore};

// ─── Data Types ────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct DeployRequest {
    pub selector: Selector,
    /// Copy sources instead of compiling.
    pub sources_only: bool,
}

#[derive(Clone, Debug)]
pub struct DeployReport {
    pub files: usize,
    pub elapsed: Duration,
}

// ─── Deploy ────────────────────────────────────────────────────────

pub fn deploy(engine: &dyn Engine, project: &Project, request: &DeployRequest) -> Result<DeployReport> {
    let archive = archive_store(project)?;
    check_targets(project, &request.selector, &archive)?;

    let scope = Scope::Project {
        project: project.clone(),
        selector: request.selector.clone(),
    };
    let set = if request.sources_only {
        let set = discover::discover(&scope)?;
        if set.is_empty() {
            return Err(Error::NoScripts);
        }
        set
    } else {
        let (outcome, set) = pipeline::compile_scope(engine, &scope)?;
        outcome.into_result()?;
        set
    };

    tracing::info!("Deploying script(s)...");
    let start = Instant::now();
    let mut files = 0;
    for (i, binding) in set.volumes.iter().enumerate() {
        let Some(target) = &binding.deploy else {
            tracing::warn!("volume '{}' has no deploy path, skipped", binding.name);
            continue;
        };
        clean_target(&archive, target)?;
        files += copy_volume(&set, i, binding, target, &archive, request.sources_only)?;
    }

    let elapsed = start.elapsed();
    tracing::info!("{} script(s) deployed in {} ms", files, elapsed.as_millis());
    Ok(DeployReport { files, elapsed })
}

/// The configured archive as a volume store.
pub fn archive_store(project: &Project) -> Result<VolumeStore> {
    match project.archive_path() {
        Some(path) => Ok(VolumeStore::archive(&path)),
        None => Err(Error::ConfigurationInvalid {
            messages: vec!["no archive configured; set 'archive' in ksc.toml".to_string()],
        }),
    }
}

/// Refuse targets that would delete a volume's own sources.
fn check_targets(project: &Project, selector: &Selector, archive: &VolumeStore) -> Result<()> {
    let mut messages = Vec::new();
    for v in project.select(selector) {
        let Some(deploy) = &v.deploy else { continue };
        let target = archive.resolve(&VolumePath::parse(deploy))?;
        if project.input_root(v).starts_with(&target) {
            messages.push(format!(
                "volume '{}' deploys to '{}', which contains its sources",
                v.name,
                target.display()
            ));
        }
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(Error::ConfigurationInvalid { messages })
    }
}

/// Remove what a previous deploy left at `target`.
pub fn clean_target(archive: &VolumeStore, target: &VolumePath) -> Result<()> {
    if !target.is_root() {
        if archive.resolve(target)?.is_dir() && archive.delete(target, false)? {
            tracing::debug!("removed {}", target);
        }
        return Ok(());
    }
    if !archive.root().is_dir() {
        return Ok(());
    }
    for item in archive.root_directory().list()? {
        if let Some(file) = item.into_file() {
            archive.delete(&file.path, false)?;
        }
    }
    Ok(())
}

fn copy_volume(
    set: &WorkingSet,
    index: usize,
    binding: &VolumeBinding,
    target: &VolumePath,
    archive: &VolumeStore,
    sources_only: bool,
) -> Result<usize> {
    let mut count = 0;
    for unit in set.units.iter().filter(|u| u.volume == index) {
        let (path, bytes) = if sources_only {
            (&unit.source, unit.content.as_bytes())
        } else {
            match &unit.artifact {
                Some(artifact) => (&unit.output, artifact.bytes()),
                None => continue,
            }
        };
        let destination = target.join(&path.to_string());
        archive.save_file(&destination, bytes)?;
        tracing::debug!("{}: {} -> {}", binding.name, path, destination);
        count += 1;
    }
    Ok(count)
}
