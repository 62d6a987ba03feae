//! Script discovery: from command-line options to a working set of units.
//!
//! A build is either project-scoped (volumes from ksc.toml, filtered by a
//! [`Selector`]) or path-scoped (a single file or directory given with
//! `-i`, no configuration involved). Both produce the same [`WorkingSet`]
//! of volume bindings and script units in discovery order.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{Project, Selector, CONFIG_FILE};
use crate::engine::Artifact;
use crate::error::{Error, Result};
use crate::volume::{self, VolumePath, VolumeStore, COMPILED_EXTENSION, SOURCE_EXTENSION};

/// `-i`, `-o` and `-v` as given on the command line.
#[derive(Clone, Debug)]
pub struct InputOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub volume: Selector,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: PathBuf::from("."),
            volume: Selector::All,
        }
    }
}

/// What a build is about.
#[derive(Clone, Debug)]
pub enum Scope {
    Project { project: Project, selector: Selector },
    Paths { input: PathBuf, output: PathBuf },
}

/// How stale output is removed before a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Purge {
    /// Delete the whole output root.
    Root,
    /// Delete a single output file.
    File(VolumePath),
    /// Delete only compiled files; sources share the tree.
    CompiledOnly,
}

/// A volume as seen by one build.
#[derive(Clone, Debug)]
pub struct VolumeBinding {
    pub name: String,
    pub index: Option<u32>,
    pub source: VolumeStore,
    pub output: VolumeStore,
    /// Target under the deployment root, project scope only.
    pub deploy: Option<VolumePath>,
    pub purge: Purge,
    /// Set for single-file builds.
    single: Option<(VolumePath, VolumePath)>,
}

/// One discovered source file.
#[derive(Clone, Debug)]
pub struct ScriptUnit {
    /// Position of the owning binding in [`WorkingSet::volumes`].
    pub volume: usize,
    pub source: VolumePath,
    pub output: VolumePath,
    pub content: String,
    pub artifact: Option<Artifact>,
}

#[derive(Clone, Debug, Default)]
pub struct WorkingSet {
    pub volumes: Vec<VolumeBinding>,
    pub units: Vec<ScriptUnit>,
}

impl WorkingSet {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn binding(&self, unit: &ScriptUnit) -> &VolumeBinding {
        &self.volumes[unit.volume]
    }

    /// One line per unit: `volume: source -> output`.
    pub fn listing(&self) -> String {
        self.units
            .iter()
            .map(|u| format!("{}: {} -> {}", self.binding(u).name, u.source, u.output))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_current(path: &Path, cwd: &Path) -> bool {
    volume::absolute(&cwd.join(path)) == volume::absolute(cwd)
}

/// Decide between project and path scope.
pub fn resolve_scope(options: &InputOptions, cwd: &Path) -> Result<Scope> {
    let input_current = is_current(&options.input, cwd);
    let output_current = is_current(&options.output, cwd);

    if input_current && output_current {
        let project = Project::locate(cwd)?;
        return Ok(Scope::Project {
            project,
            selector: options.volume.clone(),
        });
    }

    let input = volume::absolute(&cwd.join(&options.input));
    let output = volume::absolute(&cwd.join(&options.output));

    if input.is_dir() && input.join(CONFIG_FILE).is_file() {
        let mut project = Project::load(&input.join(CONFIG_FILE))?;
        if !output_current {
            project.rebase(&input, &output);
            project.validate()?;
        }
        return Ok(Scope::Project {
            project,
            selector: options.volume.clone(),
        });
    }

    if input_current {
        return Err(Error::NoInputSpecified);
    }
    if !input.exists() {
        return Err(Error::persistence(
            options.input.display(),
            io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
        ));
    }

    let output = if input.is_file() {
        if output_current {
            input.with_extension(COMPILED_EXTENSION)
        } else if output.is_dir() {
            let stem = input.file_stem().unwrap_or_default();
            output.join(stem).with_extension(COMPILED_EXTENSION)
        } else {
            output.with_extension(COMPILED_EXTENSION)
        }
    } else if output_current {
        input.clone()
    } else {
        output
    };

    if options.volume != Selector::All {
        tracing::debug!("volume selector '{}' ignored for path builds", options.volume);
    }
    Ok(Scope::Paths { input, output })
}

/// Volume bindings targeted by a scope.
pub fn bindings(scope: &Scope) -> Result<Vec<VolumeBinding>> {
    match scope {
        Scope::Project { project, selector } => Ok(project
            .select(selector)
            .into_iter()
            .map(|v| VolumeBinding {
                name: v.name.clone(),
                index: Some(v.index),
                source: VolumeStore::new(v.name.clone(), &project.input_root(v)).with_index(v.index),
                output: VolumeStore::new(v.name.clone(), &project.output_root(v)).with_index(v.index),
                deploy: v.deploy.as_deref().map(VolumePath::parse),
                purge: Purge::Root,
                single: None,
            })
            .collect()),
        Scope::Paths { input, output } if input.is_file() => {
            let (source_dir, source_name) = split_file(input)?;
            let (output_dir, output_name) = split_file(output)?;
            let source = VolumePath::parse(&source_name);
            let target = VolumePath::parse(&output_name);
            Ok(vec![VolumeBinding {
                name: source_name.clone(),
                index: None,
                source: VolumeStore::new(source_name, &source_dir),
                output: VolumeStore::new(output_name, &output_dir),
                deploy: None,
                purge: Purge::File(target.clone()),
                single: Some((source, target)),
            }])
        }
        Scope::Paths { input, output } => {
            let purge = if input.starts_with(output) {
                Purge::CompiledOnly
            } else {
                Purge::Root
            };
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| ".".to_string());
            Ok(vec![VolumeBinding {
                source: VolumeStore::new(name.clone(), input),
                output: VolumeStore::new(name.clone(), output),
                name,
                index: None,
                deploy: None,
                purge,
                single: None,
            }])
        }
    }
}

fn split_file(path: &Path) -> Result<(PathBuf, String)> {
    match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => Ok((dir.to_path_buf(), name.to_string_lossy().to_string())),
        _ => Err(Error::persistence(
            path.display(),
            io::Error::new(io::ErrorKind::InvalidInput, "not a file path"),
        )),
    }
}

/// Directories whose changes should trigger a rebuild.
pub fn watch_paths(scope: &Scope) -> Result<Vec<PathBuf>> {
    Ok(bindings(scope)?
        .into_iter()
        .map(|b| b.source.root().to_path_buf())
        .collect())
}

/// Walk every targeted volume and read its sources.
pub fn discover(scope: &Scope) -> Result<WorkingSet> {
    tracing::info!("Loading scripts...");
    let start = Instant::now();

    let volumes = bindings(scope)?;
    let mut units = Vec::new();

    for (i, binding) in volumes.iter().enumerate() {
        if let Some((source, output)) = &binding.single {
            let file = binding
                .source
                .open(source, false)?
                .and_then(|item| item.into_file())
                .ok_or_else(|| {
                    Error::persistence(
                        binding.source.root().join(source.to_relative()).display(),
                        io::Error::new(io::ErrorKind::NotFound, "no such file"),
                    )
                })?;
            units.push(ScriptUnit {
                volume: i,
                source: source.clone(),
                output: output.clone(),
                content: file.read_to_string()?,
                artifact: None,
            });
            continue;
        }

        if !binding.source.root().is_dir() {
            tracing::warn!(
                "volume '{}': input directory '{}' does not exist",
                binding.name,
                binding.source.root().display()
            );
            continue;
        }
        for file in binding.source.root_directory().walk_files()? {
            if file.path.extension() != Some(SOURCE_EXTENSION) {
                continue;
            }
            units.push(ScriptUnit {
                volume: i,
                output: file.path.with_extension(COMPILED_EXTENSION),
                content: file.read_to_string()?,
                source: file.path,
                artifact: None,
            });
        }
    }

    tracing::info!(
        "{} script(s) loaded in {} ms",
        units.len(),
        start.elapsed().as_millis()
    );
    Ok(WorkingSet { volumes, units })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "print 1.\n").unwrap();
    }

    fn opts(input: &str, output: &str) -> InputOptions {
        InputOptions {
            input: PathBuf::from(input),
            output: PathBuf::from(output),
            volume: Selector::All,
        }
    }

    #[test]
    fn test_output_without_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_scope(&opts(".", "out"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::NoInputSpecified));
    }

    #[test]
    fn test_single_file_default_output() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "hello.ks");
        let Scope::Paths { output, .. } = resolve_scope(&opts("hello.ks", "."), dir.path()).unwrap()
        else {
            panic!("expected path scope");
        };
        assert!(output.ends_with("hello.ksm"));
    }

    #[test]
    fn test_single_file_into_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "hello.ks");
        fs::create_dir_all(dir.path().join("out")).unwrap();
        let scope = resolve_scope(&opts("hello.ks", "out"), dir.path()).unwrap();
        let set = discover(&scope).unwrap();
        assert_eq!(set.units.len(), 1);
        assert_eq!(set.volumes[0].output.root(), volume::absolute(&dir.path().join("out")));
        assert_eq!(set.units[0].output.to_string(), "hello.ksm");
        assert_eq!(set.volumes[0].purge, Purge::File(VolumePath::parse("hello.ksm")));
    }

    #[test]
    fn test_directory_in_place() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "scripts/a.ks");
        touch(dir.path(), "scripts/lib/b.ks");
        touch(dir.path(), "scripts/notes.txt");
        let scope = resolve_scope(&opts("scripts", "."), dir.path()).unwrap();
        let set = discover(&scope).unwrap();
        assert_eq!(set.volumes[0].purge, Purge::CompiledOnly);
        insta::assert_snapshot!(set.listing(), @r"
        scripts: lib/b.ks -> lib/b.ksm
        scripts: a.ks -> a.ksm
        ");
    }

    #[test]
    fn test_project_input_directory_rebases_output() {
        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("proj");
        touch(&proj, "src/main.ks");
        fs::write(
            proj.join(CONFIG_FILE),
            "name = \"p\"\n\n[[volumes]]\nindex = 2\nname = \"main\"\ninput = \"./src\"\noutput = \"./dist\"\n",
        )
        .unwrap();

        let scope = resolve_scope(&opts("proj", "build"), dir.path()).unwrap();
        let set = discover(&scope).unwrap();
        assert_eq!(
            set.volumes[0].output.root(),
            volume::absolute(&dir.path().join("build").join("dist"))
        );
        assert_eq!(set.units[0].source.to_string(), "main.ks");
    }

    #[test]
    fn test_watch_single_file_watches_parent() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "x/hello.ks");
        let scope = resolve_scope(&opts("x/hello.ks", "."), dir.path()).unwrap();
        let paths = watch_paths(&scope).unwrap();
        assert_eq!(paths, [volume::absolute(&dir.path().join("x"))]);
    }
}
