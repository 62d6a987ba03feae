use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::newline::{self, LineEnding};
use super::path::VolumePath;
use crate::error::{Error, Result};

/// A resolved entry inside a volume.
#[derive(Clone, Debug)]
pub enum VolumeItem {
    File(VolumeFile),
    Directory(VolumeDirectory),
}

impl VolumeItem {
    pub fn path(&self) -> &VolumePath {
        match self {
            VolumeItem::File(f) => &f.path,
            VolumeItem::Directory(d) => &d.path,
        }
    }

    pub fn real_path(&self) -> &Path {
        match self {
            VolumeItem::File(f) => &f.real_path,
            VolumeItem::Directory(d) => &d.real_path,
        }
    }

    /// Last segment of the logical path, empty for the root.
    pub fn name(&self) -> &str {
        self.path().file_name().unwrap_or("")
    }

    pub fn size(&self) -> Result<u64> {
        match self {
            VolumeItem::File(f) => f.size(),
            VolumeItem::Directory(d) => d.size(),
        }
    }

    pub fn into_file(self) -> Option<VolumeFile> {
        match self {
            VolumeItem::File(f) => Some(f),
            VolumeItem::Directory(_) => None,
        }
    }
}

/// A file node: real path, logical path and content access.
#[derive(Clone, Debug)]
pub struct VolumeFile {
    pub real_path: PathBuf,
    pub path: VolumePath,
    ending: LineEnding,
}

impl VolumeFile {
    pub(crate) fn new(real_path: PathBuf, path: VolumePath, ending: LineEnding) -> Self {
        Self {
            real_path,
            path,
            ending,
        }
    }

    pub fn size(&self) -> Result<u64> {
        fs::metadata(&self.real_path)
            .map(|m| m.len())
            .map_err(|e| Error::persistence(&self.path, e))
    }

    /// Whole content with line endings folded to `\n`.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let bytes = fs::read(&self.real_path).map_err(|e| Error::persistence(&self.path, e))?;
        Ok(newline::from_stored(&bytes))
    }

    pub fn read_to_string(&self) -> Result<String> {
        let bytes = self.read_all()?;
        String::from_utf8(bytes).map_err(|e| {
            Error::persistence(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Append content to the existing file.
    pub fn append(&self, content: &[u8]) -> Result<()> {
        if !self.real_path.is_file() {
            return Err(Error::persistence(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }
        let bytes = newline::to_stored(content, self.ending);
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.real_path)
            .map_err(|e| Error::persistence(&self.path, e))?;
        file.write_all(&bytes)
            .and_then(|_| file.flush())
            .map_err(|e| Error::persistence(&self.path, e))
    }

    /// Truncate to zero length.
    pub fn clear(&self) -> Result<()> {
        fs::write(&self.real_path, b"").map_err(|e| Error::persistence(&self.path, e))
    }
}

/// A directory node. Children are computed on demand.
#[derive(Clone, Debug)]
pub struct VolumeDirectory {
    pub real_path: PathBuf,
    pub path: VolumePath,
    ending: LineEnding,
}

impl VolumeDirectory {
    pub(crate) fn new(real_path: PathBuf, path: VolumePath, ending: LineEnding) -> Self {
        Self {
            real_path,
            path,
            ending,
        }
    }

    /// Visible children: directories sorted by name, then files sorted by name.
    /// Hidden and system entries are skipped.
    pub fn list(&self) -> Result<Vec<VolumeItem>> {
        let entries =
            fs::read_dir(&self.real_path).map_err(|e| Error::persistence(&self.path, e))?;

        let mut directories = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::persistence(&self.path, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let file_type = entry
                .file_type()
                .map_err(|e| Error::persistence(self.path.join(&name), e))?;
            if is_hidden(&entry.path(), &name) {
                continue;
            }
            if file_type.is_dir() {
                directories.push(name);
            } else {
                files.push(name);
            }
        }
        directories.sort();
        files.sort();

        let mut result = Vec::with_capacity(directories.len() + files.len());
        for name in directories {
            result.push(VolumeItem::Directory(VolumeDirectory::new(
                self.real_path.join(&name),
                self.path.join(&name),
                self.ending,
            )));
        }
        for name in files {
            result.push(VolumeItem::File(VolumeFile::new(
                self.real_path.join(&name),
                self.path.join(&name),
                self.ending,
            )));
        }
        Ok(result)
    }

    /// Total size of every visible file below this directory.
    pub fn size(&self) -> Result<u64> {
        let mut total = 0;
        for item in self.list()? {
            total += item.size()?;
        }
        Ok(total)
    }

    /// Depth-first walk over every visible file, in listing order.
    pub fn walk_files(&self) -> Result<Vec<VolumeFile>> {
        let mut result = Vec::new();
        self.walk_into(&mut result)?;
        Ok(result)
    }

    fn walk_into(&self, out: &mut Vec<VolumeFile>) -> Result<()> {
        for item in self.list()? {
            match item {
                VolumeItem::Directory(dir) => dir.walk_into(out)?,
                VolumeItem::File(file) => out.push(file),
            }
        }
        Ok(())
    }
}

#[cfg(not(windows))]
fn is_hidden(_path: &Path, name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(windows)]
fn is_hidden(path: &Path, name: &str) -> bool {
    use std::os::windows::fs::MetadataExt;
    const HIDDEN: u32 = 0x2;
    const SYSTEM: u32 = 0x4;
    if name.starts_with('.') {
        return true;
    }
    fs::metadata(path)
        .map(|m| m.file_attributes() & (HIDDEN | SYSTEM) != 0)
        .unwrap_or(false)
}
