//! Source providers: where file lists, contents and history come from

use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use lumis_core::ScanConfig;

use crate::git::GitHistory;
use crate::languages::route;

/// Version-control metadata for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub modified_at: DateTime<Utc>,
    pub author: Option<String>,
}

/// Everything a synchronization run reads from a repository.
///
/// Paths are relative to the repository root and use `/` separators.
pub trait SourceProvider: Send + Sync {
    /// Eligible files, sorted. An error here is fatal for the run.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Raw bytes of one file. `NotFound` means the file was deleted.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    fn last_modified(&self, path: &str) -> Option<FileMetadata>;

    /// Revision identifier of the snapshot being read. `None` when unknown,
    /// or when the content served may differ from that revision.
    fn revision(&self) -> Option<String>;
}

/// Render a relative path with `/` separators.
pub fn normalize(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A working tree on disk, with metadata from git when available.
pub struct FsSource {
    root: PathBuf,
    skip_dirs: Arc<HashSet<String>>,
    ignore_extensions: HashSet<String>,
    excludes: GlobSet,
    history: Option<GitHistory>,
}

impl FsSource {
    pub fn open(root: &Path, scan: &ScanConfig) -> Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("{} is not a directory", root.display());
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in &scan.exclude_globs {
            builder.add(
                Glob::new(pattern).with_context(|| format!("invalid exclude glob {}", pattern))?,
            );
        }
        let excludes = builder.build().context("building exclude globs")?;

        let history = match GitHistory::load(root) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("Git metadata unavailable for {}: {:#}", root.display(), e);
                None
            }
        };

        Ok(Self {
            root: root.to_path_buf(),
            skip_dirs: Arc::new(scan.skip_dirs.iter().cloned().collect()),
            ignore_extensions: scan
                .ignore_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            excludes,
            history,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_ignored_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.ignore_extensions.contains(&e.to_ascii_lowercase()))
    }

    /// Whether a root-relative path is one a full scan would sync.
    fn is_eligible(&self, rel: &str) -> bool {
        let path = Path::new(rel);
        let in_skipped_dir = path
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .any(|c| self.skip_dirs.contains(c.as_os_str().to_string_lossy().as_ref()));
        !in_skipped_dir
            && !self.is_ignored_extension(path)
            && !self.excludes.is_match(path)
            && route(path).is_some()
    }
}

impl SourceProvider for FsSource {
    fn list_files(&self) -> Result<Vec<String>> {
        let skip_dirs = self.skip_dirs.clone();
        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && skip_dirs.contains(entry.file_name().to_string_lossy().as_ref()))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!("Walk error: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            if self.is_ignored_extension(path) {
                continue;
            }
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            if self.excludes.is_match(rel) {
                continue;
            }
            files.push(normalize(rel));
        }

        files.sort();
        tracing::debug!("Found {} files under {}", files.len(), self.root.display());
        Ok(files)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(path))
    }

    fn last_modified(&self, path: &str) -> Option<FileMetadata> {
        let entry = self.history.as_ref()?.file(path)?;
        Some(FileMetadata {
            modified_at: entry.modified_at,
            author: entry.author.clone(),
        })
    }

    fn revision(&self) -> Option<String> {
        let history = self.history.as_ref()?;
        let head = history.head()?;
        if let Some(path) = history.dirty_paths().iter().find(|p| self.is_eligible(p)) {
            tracing::debug!("{} differs from HEAD; working tree has no revision", path);
            return None;
        }
        Some(head.to_string())
    }
}

/// An in-memory snapshot, used for pushed payloads and tests.
#[derive(Default)]
pub struct MemorySource {
    files: DashMap<String, Vec<u8>>,
    metadata: DashMap<String, FileMetadata>,
    revision: std::sync::RwLock<Option<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        let source = Self::new();
        for (path, content) in files {
            source.insert(path, content);
        }
        source
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) {
        self.files.remove(path);
        self.metadata.remove(path);
    }

    pub fn set_metadata(&self, path: impl Into<String>, modified_at: DateTime<Utc>, author: Option<String>) {
        self.metadata
            .insert(path.into(), FileMetadata { modified_at, author });
    }

    pub fn set_revision(&self, revision: impl Into<String>) {
        if let Ok(mut guard) = self.revision.write() {
            *guard = Some(revision.into());
        }
    }
}

impl SourceProvider for MemorySource {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut files: Vec<String> = self.files.iter().map(|r| r.key().clone()).collect();
        files.sort();
        Ok(files)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|r| r.value().clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn last_modified(&self, path: &str) -> Option<FileMetadata> {
        self.metadata.get(path).map(|r| r.value().clone())
    }

    fn revision(&self) -> Option<String> {
        self.revision.read().ok().and_then(|guard| guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_fs_source_skips_excluded_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/app.py", "def a(): pass\n");
        write(root, "src/logo.PNG", "binary");
        write(root, "node_modules/lib/index.js", "function x() {}\n");
        write(root, "build/out.js", "function y() {}\n");
        write(root, "vendor/dep.go", "package dep\n");
        write(root, "README.md", "# readme\n");

        let mut scan = ScanConfig::default();
        scan.exclude_globs.push("vendor/**".to_string());
        let source = FsSource::open(root, &scan).unwrap();

        assert_eq!(source.list_files().unwrap(), vec!["README.md", "src/app.py"]);
        assert_eq!(source.read("src/app.py").unwrap(), b"def a(): pass\n");
        assert_eq!(
            source.read("src/gone.py").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_revision_requires_clean_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let repo = git2::Repository::init(root).unwrap();
        write(root, "src/app.py", "def a(): pass\n");
        let sig = git2::Signature::now("Tester", "t@example.com").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("src/app.py")).unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let head = repo
            .commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap()
            .to_string();

        // Untracked state, docs and skipped dirs leave the revision intact
        write(root, ".lumis/graph.db", "db");
        write(root, "NOTES.md", "notes\n");
        write(root, "node_modules/x/index.js", "function x() {}\n");
        let source = FsSource::open(root, &ScanConfig::default()).unwrap();
        assert_eq!(source.revision(), Some(head));

        write(root, "src/app.py", "def a(): b()\n");
        let source = FsSource::open(root, &ScanConfig::default()).unwrap();
        assert_eq!(source.revision(), None);
    }

    #[test]
    fn test_fs_source_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsSource::open(&dir.path().join("missing"), &ScanConfig::default()).is_err());
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::from_files([("b.py", "def b(): pass"), ("a.py", "def a(): b()")]);
        source.set_revision("rev-1");
        source.set_metadata("a.py", Utc::now(), None);

        assert_eq!(source.list_files().unwrap(), vec!["a.py", "b.py"]);
        assert_eq!(source.revision().as_deref(), Some("rev-1"));
        assert!(source.last_modified("a.py").is_some());
        assert!(source.last_modified("b.py").is_none());

        source.remove("a.py");
        assert_eq!(source.read("a.py").unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./src/lib/mod.rs")), "src/lib/mod.rs");
    }
}
