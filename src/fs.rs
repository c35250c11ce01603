//! File lookup used by `Include` and file-backed operators.
//!
//! The parser never touches `std::fs` directly. It goes through a
//! [`FileSystem`], which lets a bundled rule corpus live in memory and be
//! overlaid with a local directory.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hierarchical file lookup.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Read a whole file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Return the files matching `pattern`, sorted. No match is not an error.
    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;

    /// Whether `path` is absolute for this filesystem.
    fn is_absolute(&self, path: &Path) -> bool {
        path.has_root()
    }
}

/// Returns true if `pattern` contains glob metacharacters.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn invalid_pattern(err: glob::PatternError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
}

/// The host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in glob::glob(pattern).map_err(invalid_pattern)? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, pattern, "error reading glob entry");
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn is_absolute(&self, path: &Path) -> bool {
        path.is_absolute()
    }
}

/// An in-memory filesystem, e.g. a rule corpus compiled into the binary.
#[derive(Debug, Default, Clone)]
pub struct EmbeddedFileSystem {
    files: BTreeMap<PathBuf, String>,
}

impl EmbeddedFileSystem {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files.insert(normalize(&path.into()), contents.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the filesystem holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSystem for EmbeddedFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found in embedded filesystem", path.display()),
            )
        })
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let normalized = normalize(Path::new(pattern));
        let pattern = glob::Pattern::new(&normalized.to_string_lossy()).map_err(invalid_pattern)?;
        Ok(self
            .files
            .keys()
            .filter(|path| pattern.matches_path(path))
            .cloned()
            .collect())
    }
}

/// Collapse `.` and `..` components and leading `./` so lookups are stable.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

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

/// Ordered overlay of several filesystems. Earlier layers win on reads; globs
/// return the union.
#[derive(Debug, Default, Clone)]
pub struct MergedFileSystem {
    layers: Vec<Arc<dyn FileSystem>>,
}

impl MergedFileSystem {
    /// Create an overlay from layers, highest priority first.
    pub fn new(layers: Vec<Arc<dyn FileSystem>>) -> Self {
        Self { layers }
    }

    /// Append a lower-priority layer.
    pub fn push(&mut self, layer: Arc<dyn FileSystem>) {
        self.layers.push(layer);
    }
}

impl FileSystem for MergedFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let mut last_error = None;
        for layer in &self.layers {
            match layer.read_to_string(path) {
                Ok(contents) => return Ok(contents),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
        }))
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for layer in &self.layers {
            files.extend(layer.glob(pattern)?);
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn is_absolute(&self, path: &Path) -> bool {
        self.layers.iter().any(|layer| layer.is_absolute(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_glob() {
        assert!(is_glob("rules/*.conf"));
        assert!(is_glob("rules/rule?.conf"));
        assert!(is_glob("rules/[ab].conf"));
        assert!(!is_glob("rules/main.conf"));
    }

    #[test]
    fn test_embedded_read_and_glob() {
        let fs = EmbeddedFileSystem::new()
            .with_file("rules/a.conf", "SecAction \"id:1\"")
            .with_file("rules/b.conf", "SecAction \"id:2\"")
            .with_file("data/list.txt", "x");

        assert_eq!(fs.len(), 3);
        assert_eq!(
            fs.read_to_string(Path::new("./rules/a.conf")).unwrap(),
            "SecAction \"id:1\""
        );
        assert_eq!(
            fs.glob("rules/*.conf").unwrap(),
            vec![PathBuf::from("rules/a.conf"), PathBuf::from("rules/b.conf")]
        );
        assert!(fs.glob("missing/*.conf").unwrap().is_empty());

        let err = fs.read_to_string(Path::new("rules/c.conf")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_normalize_parent_components() {
        assert_eq!(
            normalize(Path::new("rules/sub/../a.conf")),
            PathBuf::from("rules/a.conf")
        );
    }

    #[test]
    fn test_merged_overlay() {
        let bundled: Arc<dyn FileSystem> = Arc::new(
            EmbeddedFileSystem::new()
                .with_file("crs/setup.conf", "bundled")
                .with_file("crs/rules.conf", "bundled rules"),
        );
        let local: Arc<dyn FileSystem> =
            Arc::new(EmbeddedFileSystem::new().with_file("crs/setup.conf", "local"));

        let merged = MergedFileSystem::new(vec![local, bundled]);
        assert_eq!(
            merged.read_to_string(Path::new("crs/setup.conf")).unwrap(),
            "local"
        );
        assert_eq!(
            merged.read_to_string(Path::new("crs/rules.conf")).unwrap(),
            "bundled rules"
        );
        assert_eq!(merged.glob("crs/*.conf").unwrap().len(), 2);
    }
}
