use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Volume-relative logical path.
///
/// Segments are separated by `/`. A leading `/` addresses the volume root,
/// `.` segments are dropped and `..` pops the previous segment. A path that
/// pops past the root is kept as pointing outside so that resolution can
/// refuse it instead of clamping it.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VolumePath {
    segments: Vec<String>,
    outside: bool,
}

impl VolumePath {
    /// The volume root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a logical path string.
    pub fn parse(path: &str) -> Self {
        let mut result = Self::root();
        for segment in path.split(['/', '\\']) {
            result.push(segment);
        }
        result
    }

    /// Build a logical path from a relative filesystem path.
    pub fn from_relative(path: &Path) -> Self {
        let mut result = Self::root();
        for component in path.components() {
            match component {
                Component::Normal(part) => result.push(&part.to_string_lossy()),
                Component::ParentDir => result.push(".."),
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => result.outside = true,
            }
        }
        result
    }

    fn push(&mut self, segment: &str) {
        match segment {
            "" | "." => {}
            ".." => {
                if self.segments.pop().is_none() {
                    self.outside = true;
                }
            }
            _ => self.segments.push(segment.to_string()),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty() && !self.outside
    }

    /// True when `..` segments climbed above the volume root.
    pub fn points_outside(&self) -> bool {
        self.outside
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            outside: self.outside,
        })
    }

    pub fn join(&self, child: &str) -> Self {
        let mut result = self.clone();
        for segment in child.split(['/', '\\']) {
            result.push(segment);
        }
        result
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Replace (or add) the extension of the last segment.
    pub fn with_extension(&self, extension: &str) -> Self {
        let mut result = self.clone();
        if let Some(last) = result.segments.last_mut() {
            let stem = match last.rfind('.') {
                Some(dot) if dot > 0 => &last[..dot],
                _ => last.as_str(),
            };
            *last = format!("{}.{}", stem, extension);
        }
        result
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(dot) if dot > 0 => Some(&name[dot + 1..]),
            _ => None,
        }
    }

    /// Relative filesystem path for these segments.
    pub fn to_relative(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

impl fmt::Display for VolumePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outside {
            f.write_str("../")?;
        }
        f.write_str(&self.segments.join("/"))
    }
}

impl From<&str> for VolumePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Lexically normalize a filesystem path into an absolute one.
///
/// Relative paths are taken against the current directory. `.` is dropped
/// and `..` pops; nothing touches the filesystem, so the path may not exist.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    normalize(&joined)
}

/// Lexical normalization without making the path absolute.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_dots_and_leading_slash() {
        let p = VolumePath::parse("/boot/./lib/../main.ks");
        assert_eq!(p.segments(), ["boot", "main.ks"]);
        assert!(!p.points_outside());
        assert_eq!(p.to_string(), "boot/main.ks");
    }

    #[test]
    fn test_parent_dir_past_root_points_outside() {
        let p = VolumePath::parse("../secrets");
        assert!(p.points_outside());
        assert!(!p.is_root());
        assert!(VolumePath::parse("a/../..").points_outside());
    }

    #[test]
    fn test_with_extension() {
        let p = VolumePath::parse("lib/util.ks");
        assert_eq!(p.with_extension("ksm").to_string(), "lib/util.ksm");
        assert_eq!(VolumePath::parse("boot").with_extension("ks").to_string(), "boot.ks");
        assert_eq!(VolumePath::parse(".hidden").with_extension("ks").to_string(), ".hidden.ks");
        assert_eq!(p.extension(), Some("ks"));
    }

    #[test]
    fn test_parent_and_depth() {
        let p = VolumePath::parse("a/b/c.ks");
        assert_eq!(p.depth(), 3);
        assert_eq!(p.parent().unwrap().to_string(), "a/b");
        assert!(VolumePath::root().parent().is_none());
        assert!(VolumePath::root().is_root());
    }

    #[test]
    fn test_from_relative() {
        let p = VolumePath::from_relative(Path::new("sub/dir/file.ks"));
        assert_eq!(p.to_string(), "sub/dir/file.ks");
        assert_eq!(p.to_relative(), PathBuf::from("sub/dir/file.ks"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("/x/./y/..")), PathBuf::from("/x"));
        assert!(absolute(Path::new("rel")).is_absolute());
    }
}
