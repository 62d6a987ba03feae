//! Sandboxed volumes over real directory trees.
//!
//! A [`VolumeStore`] maps logical [`VolumePath`]s onto a single root
//! directory. Every resolution is checked for containment: lexically
//! (`..` past the root) and physically (the nearest existing ancestor is
//! canonicalized, so a symlink leading out of the root is caught too).
//! Source and output sides of a project volume are two independent
//! stores sharing this logic.

mod newline;
mod node;
mod path;


use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use newline::{is_binary, LineEnding, ARTIFACT_MAGIC};
pub use node::{VolumeDirectory, VolumeFile, VolumeItem};
pub use path::{absolute, normalize, VolumePath};

use crate::error::{Error, Result};

/// Extension of human-written scripts.
pub const SOURCE_EXTENSION: &str = "ks";
/// Extension of compiled artifacts.
pub const COMPILED_EXTENSION: &str = "ksm";

/// Index reserved for the deployment root.
pub const ARCHIVE_INDEX: u32 = 0;
/// Name of the deployment-root volume.
pub const ARCHIVE_NAME: &str = "Archive";

#[derive(Clone, Debug)]
pub struct VolumeStore {
    name: String,
    index: Option<u32>,
    root: PathBuf,
    ending: LineEnding,
}

impl VolumeStore {
    /// Create a store rooted at `root` (made absolute, not required to exist).
    pub fn new(name: impl Into<String>, root: &Path) -> Self {
        Self {
            name: name.into(),
            index: None,
            root: absolute(root),
            ending: LineEnding::native(),
        }
    }

    /// The deployment root volume.
    pub fn archive(root: &Path) -> Self {
        Self::new(ARCHIVE_NAME, root).with_index(ARCHIVE_INDEX)
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_line_ending(mut self, ending: LineEnding) -> Self {
        self.ending = ending;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical path to its real path inside the root.
    pub fn resolve(&self, path: &VolumePath) -> Result<PathBuf> {
        if path.points_outside() {
            return Err(self.escape(path));
        }
        let joined = normalize(&self.root.join(path.to_relative()));
        if !joined.starts_with(&self.root) {
            return Err(self.escape(path));
        }

        let physical_root = canonicalize_existing(&self.root)
            .map_err(|e| Error::persistence(path, e))?;
        let physical = canonicalize_existing(&joined).map_err(|e| Error::persistence(path, e))?;
        if !physical.starts_with(&physical_root) {
            return Err(self.escape(path));
        }
        Ok(joined)
    }

    /// Logical path of a real path below the root.
    pub fn logical(&self, real: &Path) -> Result<VolumePath> {
        let real = absolute(real);
        match real.strip_prefix(&self.root) {
            Ok(relative) => Ok(VolumePath::from_relative(relative)),
            Err(_) => Err(Error::PathEscape {
                volume: self.name.clone(),
                path: real.display().to_string(),
            }),
        }
    }

    /// Find what a logical path refers to.
    ///
    /// Directories and exact file matches win. Otherwise `<path>.ks` and
    /// `<path>.ksm` are tried; when both exist `prefer_compiled` picks.
    pub fn search(&self, path: &VolumePath, prefer_compiled: bool) -> Result<Option<VolumeItem>> {
        let real = self.resolve(path)?;

        if real.is_dir() {
            return Ok(Some(VolumeItem::Directory(VolumeDirectory::new(
                real,
                path.clone(),
                self.ending,
            ))));
        }
        if real.is_file() {
            return Ok(Some(self.file_item(real, path.clone())));
        }
        if path.is_root() {
            return Ok(None);
        }

        let source = cooked(path, SOURCE_EXTENSION);
        let compiled = cooked(path, COMPILED_EXTENSION);
        let source_real = self.resolve(&source)?;
        let compiled_real = self.resolve(&compiled)?;

        let found = match (source_real.is_file(), compiled_real.is_file()) {
            (true, true) if prefer_compiled => Some((compiled_real, compiled)),
            (true, _) => Some((source_real, source)),
            (false, true) => Some((compiled_real, compiled)),
            (false, false) => None,
        };
        Ok(found.map(|(real, path)| self.file_item(real, path)))
    }

    pub fn open(&self, path: &VolumePath, prefer_compiled: bool) -> Result<Option<VolumeItem>> {
        self.search(path, prefer_compiled)
    }

    pub fn exists(&self, path: &VolumePath, prefer_compiled: bool) -> Result<bool> {
        Ok(self.search(path, prefer_compiled)?.is_some())
    }

    /// The root directory node. The root itself may not exist yet.
    pub fn root_directory(&self) -> VolumeDirectory {
        VolumeDirectory::new(self.root.clone(), VolumePath::root(), self.ending)
    }

    /// Remove a file or a whole directory tree.
    ///
    /// Returns `false` when nothing is there.
    pub fn delete(&self, path: &VolumePath, prefer_compiled: bool) -> Result<bool> {
        if path.is_root() {
            return Err(Error::RootPath {
                volume: self.name.clone(),
                operation: "delete",
            });
        }
        match self.search(path, prefer_compiled)? {
            None => Ok(false),
            Some(VolumeItem::File(file)) => {
                fs::remove_file(&file.real_path).map_err(|e| Error::persistence(&file.path, e))?;
                Ok(true)
            }
            Some(VolumeItem::Directory(dir)) => {
                fs::remove_dir_all(&dir.real_path).map_err(|e| Error::persistence(&dir.path, e))?;
                Ok(true)
            }
        }
    }

    pub fn create_directory(&self, path: &VolumePath) -> Result<VolumeDirectory> {
        let real = self.resolve(path)?;
        if real.is_dir() {
            return Err(Error::AlreadyExists {
                path: path.to_string(),
            });
        }
        fs::create_dir_all(&real).map_err(|e| Error::persistence(path, e))?;
        Ok(VolumeDirectory::new(real, path.clone(), self.ending))
    }

    /// Create an empty file. The parent directory is created when missing.
    pub fn create_file(&self, path: &VolumePath) -> Result<VolumeFile> {
        if path.is_root() {
            return Err(Error::RootPath {
                volume: self.name.clone(),
                operation: "create a file at",
            });
        }
        let real = self.resolve(path)?;
        if real.exists() {
            return Err(Error::AlreadyExists {
                path: path.to_string(),
            });
        }
        if let Some(parent) = real.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::ParentMissing {
                path: path.to_string(),
                source,
            })?;
        }
        fs::File::create(&real).map_err(|e| Error::persistence(path, e))?;
        Ok(VolumeFile::new(real, path.clone(), self.ending))
    }

    /// Write `content` at `path`, replacing any existing file.
    pub fn save_file(&self, path: &VolumePath, content: &[u8]) -> Result<VolumeFile> {
        if path.is_root() {
            return Err(Error::RootPath {
                volume: self.name.clone(),
                operation: "save a file at",
            });
        }
        fs::create_dir_all(&self.root).map_err(|e| Error::persistence(&self.name, e))?;

        let real = self.resolve(path)?;
        if real.is_dir() {
            return Err(Error::DirectoryConflict {
                path: path.to_string(),
            });
        }
        if let Some(parent) = real.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::ParentMissing {
                path: path.to_string(),
                source,
            })?;
        }
        let stored = newline::to_stored(content, self.ending);
        fs::write(&real, stored).map_err(|e| Error::persistence(path, e))?;
        Ok(VolumeFile::new(real, path.clone(), self.ending))
    }

    /// Delete everything and recreate the root empty.
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| Error::persistence(&self.name, e))?;
        }
        fs::create_dir_all(&self.root).map_err(|e| Error::persistence(&self.name, e))
    }

    fn file_item(&self, real: PathBuf, path: VolumePath) -> VolumeItem {
        VolumeItem::File(VolumeFile::new(real, path, self.ending))
    }

    fn escape(&self, path: &VolumePath) -> Error {
        Error::PathEscape {
            volume: self.name.clone(),
            path: path.to_string(),
        }
    }
}

/// `<path>.<extension>`, appended rather than replaced.
fn cooked(path: &VolumePath, extension: &str) -> VolumePath {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent.join(&format!("{}.{}", name, extension)),
        _ => path.clone(),
    }
}

/// Canonicalize the deepest existing ancestor and re-append the rest.
///
/// A path below a regular file does not exist; its walk stops at that file.
fn canonicalize_existing(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(canonical) => {
                let mut result = canonical;
                for part in rest.iter().rev() {
                    result.push(part);
                }
                return Ok(result);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound || existing.symlink_metadata().is_err() => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                rest.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}
