use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Selector;
use crate::error::{Error, Result};
use crate::volume::{self, ARCHIVE_INDEX};

/// File name of the project configuration.
pub const CONFIG_FILE: &str = "ksc.toml";

/// Project configuration from ksc.toml.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Deployment root. Empty when no installation is configured.
    #[serde(default)]
    pub archive: PathBuf,
    #[serde(default)]
    pub volumes: Vec<VolumeConfig>,
    /// Composite scripts: name → `step && step ...`.
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    /// Directory containing ksc.toml. Relative volume paths resolve against it.
    #[serde(skip)]
    pub root_dir: PathBuf,
}

/// One `[[volumes]]` entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub index: u32,
    pub name: String,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Logical path under the deployment root; `.` is the root itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<String>,
}

impl Project {
    /// Parse a configuration document.
    pub fn from_toml(content: &str) -> Result<Project> {
        Self::parse(content, Path::new(CONFIG_FILE))
    }

    fn parse(content: &str, path: &Path) -> Result<Project> {
        toml::from_str(content).map_err(|source| Error::ConfigurationParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Load and validate a ksc.toml file.
    pub fn load(toml_path: &Path) -> Result<Project> {
        let content = fs::read_to_string(toml_path)
            .map_err(|e| Error::persistence(toml_path.display(), e))?;
        let mut project = Self::parse(&content, toml_path)?;
        project.root_dir = volume::absolute(toml_path.parent().unwrap_or(Path::new(".")));
        project.validate()?;
        tracing::debug!("loaded configuration from {}", toml_path.display());
        Ok(project)
    }

    /// Try to find a ksc.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = volume::absolute(start_dir);
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// `find` followed by `load`; a missing file is `ConfigurationMissing`.
    pub fn locate(start_dir: &Path) -> Result<Project> {
        match Self::find(start_dir) {
            Some(path) => Self::load(&path),
            None => Err(Error::ConfigurationMissing {
                searched: start_dir.to_path_buf(),
            }),
        }
    }

    /// Write ksc.toml into `dir`, replacing any existing file.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(CONFIG_FILE);
        let content = self.to_toml()?;
        fs::create_dir_all(dir).map_err(|e| Error::persistence(dir.display(), e))?;
        fs::write(&path, content).map_err(|e| Error::persistence(path.display(), e))?;
        Ok(path)
    }

    /// Report every semantic problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut messages = Vec::new();

        if self.name.trim().is_empty() {
            messages.push("project name is empty".to_string());
        }

        for (i, v) in self.volumes.iter().enumerate() {
            if v.index == ARCHIVE_INDEX {
                messages.push(format!(
                    "volume '{}' uses index {}, which is reserved for the archive",
                    v.name, ARCHIVE_INDEX
                ));
            }
            if v.name.trim().is_empty() {
                messages.push(format!("volume {} has an empty name", v.index));
            }
            for other in &self.volumes[..i] {
                if other.index == v.index {
                    messages.push(format!(
                        "volumes '{}' and '{}' share index {}",
                        other.name, v.name, v.index
                    ));
                }
                if other.name == v.name {
                    messages.push(format!("volume name '{}' is used twice", v.name));
                }
            }
        }

        for v in &self.volumes {
            let input = self.input_root(v);
            for other in &self.volumes {
                let output = self.output_root(other);
                if input.starts_with(&output) {
                    messages.push(format!(
                        "input of volume '{}' lies inside the output of volume '{}'",
                        v.name, other.name
                    ));
                }
            }
        }

        for (i, a) in self.volumes.iter().enumerate() {
            for b in &self.volumes[i + 1..] {
                let (oa, ob) = (self.output_root(a), self.output_root(b));
                if oa.starts_with(&ob) || ob.starts_with(&oa) {
                    messages.push(format!(
                        "outputs of volumes '{}' and '{}' overlap",
                        a.name, b.name
                    ));
                }
            }
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigurationInvalid { messages })
        }
    }

    /// Volumes targeted by a selector, in configuration order.
    pub fn select(&self, selector: &Selector) -> Vec<&VolumeConfig> {
        self.volumes.iter().filter(|v| selector.matches(v)).collect()
    }

    pub fn input_root(&self, volume: &VolumeConfig) -> PathBuf {
        volume::normalize(&self.root_dir.join(&volume.input))
    }

    pub fn output_root(&self, volume: &VolumeConfig) -> PathBuf {
        volume::normalize(&self.root_dir.join(&volume.output))
    }

    /// Resolved deployment root, if one is configured.
    pub fn archive_path(&self) -> Option<PathBuf> {
        if self.archive.as_os_str().is_empty() {
            return None;
        }
        Some(volume::normalize(&self.root_dir.join(&self.archive)))
    }

    /// Move every volume's input onto `input_dir` and output onto `output_dir`.
    ///
    /// Used when `-i <dir>` names a project directory other than the root.
    pub fn rebase(&mut self, input_dir: &Path, output_dir: &Path) {
        let root = self.root_dir.clone();
        for v in &mut self.volumes {
            let input = root.join(&v.input);
            let output = root.join(&v.output);
            if let Ok(rel) = input.strip_prefix(&root) {
                v.input = input_dir.join(rel);
            }
            if let Ok(rel) = output.strip_prefix(&root) {
                v.output = output_dir.join(rel);
            }
        }
    }
}
