//! `ksc init`: default configuration and directory layout.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::project::{Project, VolumeConfig, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::volume;

/// Where deployed scripts live inside a game installation.
pub const ARCHIVE_SUFFIX: &str = "Ships/Script";

const INSTALL_DIR: &str = "steamapps/common/Kerbal Space Program";

const STARTER_BOOT: &str = "// Runs when the vessel's processor boots.\n\
                            print \"booting \" + ship:name + \"...\".\n";

#[derive(Clone, Debug, Default)]
pub struct InitOptions {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    /// Overwrite an existing ksc.toml.
    pub yes: bool,
}

/// What `init` wrote.
#[derive(Debug)]
pub struct Scaffolded {
    pub project: Project,
    pub config_path: PathBuf,
    pub created: Vec<PathBuf>,
}

/// Project directory for the given options.
///
/// `path/name` when a path is given, else the current directory.
pub fn project_dir(options: &InitOptions) -> PathBuf {
    match (&options.path, &options.name) {
        (Some(path), Some(name)) => path.join(name),
        (Some(path), None) => path.clone(),
        (None, _) => PathBuf::from("."),
    }
}

/// Default configuration for a new project.
pub fn default_project(name: &str, archive: Option<PathBuf>) -> Project {
    let mut scripts = BTreeMap::new();
    scripts.insert("compile".to_string(), "ksc compile".to_string());
    scripts.insert("deploy".to_string(), "ksc deploy".to_string());

    Project {
        name: name.to_string(),
        description: String::new(),
        archive: archive.unwrap_or_default(),
        volumes: vec![
            VolumeConfig {
                index: 1,
                name: "boot".to_string(),
                input: PathBuf::from("./boot"),
                output: PathBuf::from("./dist/boot"),
                deploy: Some("boot".to_string()),
            },
            VolumeConfig {
                index: 2,
                name: name.to_string(),
                input: PathBuf::from("./src"),
                output: PathBuf::from("./dist/src"),
                deploy: Some(".".to_string()),
            },
        ],
        scripts,
        root_dir: PathBuf::new(),
    }
}

/// Write ksc.toml and the default source directories.
pub fn init_project(options: &InitOptions) -> Result<Scaffolded> {
    let dir = volume::absolute(&project_dir(options));
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() && !options.yes {
        return Err(Error::AlreadyExists {
            path: config_path.display().to_string(),
        });
    }

    let name = match &options.name {
        Some(name) => name.clone(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string()),
    };
    let archive = detect_archive();
    match &archive {
        Some(path) => tracing::info!("Found installation: {}", path.display()),
        None => tracing::debug!("no installation detected, archive left empty"),
    }

    let mut project = default_project(&name, archive);
    project.root_dir = dir.clone();
    project.validate()?;
    let config_path = project.save(&dir)?;

    let mut created = Vec::new();
    for v in &project.volumes {
        let input = project.input_root(v);
        if !input.exists() {
            fs::create_dir_all(&input).map_err(|e| Error::persistence(input.display(), e))?;
            created.push(input);
        }
    }
    let boot = dir.join("boot").join("boot.ks");
    if boot.parent().is_some_and(Path::is_dir) && !boot.exists() {
        fs::write(&boot, STARTER_BOOT).map_err(|e| Error::persistence(boot.display(), e))?;
        created.push(boot);
    }

    Ok(Scaffolded {
        project,
        config_path,
        created,
    })
}

/// Known install locations, most likely first.
pub fn install_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("C:/Program Files (x86)/Steam").join(INSTALL_DIR),
        PathBuf::from("C:/Program Files/Steam").join(INSTALL_DIR),
    ];
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        candidates.push(home.join(".steam/steam").join(INSTALL_DIR));
        candidates.push(home.join(".local/share/Steam").join(INSTALL_DIR));
        candidates.push(home.join("Library/Application Support/Steam").join(INSTALL_DIR));
    }
    candidates
}

/// `Ships/Script` of the first installation found on this machine.
pub fn detect_archive() -> Option<PathBuf> {
    install_candidates()
        .into_iter()
        .find(|p| p.is_dir())
        .map(|p| p.join(ARCHIVE_SUFFIX))
}
