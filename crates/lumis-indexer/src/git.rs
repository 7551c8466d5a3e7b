//! Per-file commit metadata from git history

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use git2::{DiffOptions, Repository, Sort, Status, StatusOptions};

/// Newest commit that touched a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHistory {
    pub modified_at: DateTime<Utc>,
    pub author: Option<String>,
}

/// Snapshot of a repository's history, keyed by root-relative path.
#[derive(Debug, Default)]
pub struct GitHistory {
    head: Option<String>,
    files: HashMap<String, FileHistory>,
    /// Paths whose working-tree or index state differs from HEAD.
    dirty: Vec<String>,
}

impl GitHistory {
    /// Load history for the repository containing `root`. Returns `Ok(None)`
    /// when `root` is not inside a git work tree.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let repo = match Repository::discover(root) {
            Ok(repo) => repo,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e).context("opening git repository"),
        };
        let Some(workdir) = repo.workdir() else {
            return Ok(None);
        };
        let prefix = relative_prefix(root, workdir);

        let head = match repo.head() {
            Ok(reference) => reference.target(),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                tracing::debug!("Repository has no commits yet");
                return Ok(Some(Self::default()));
            }
            Err(e) => return Err(e).context("resolving HEAD"),
        };

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push_head()?;

        let mut files = HashMap::new();
        for oid in revwalk {
            let oid = match oid {
                Ok(oid) => oid,
                Err(e) => {
                    tracing::warn!("Skipping unreadable commit: {}", e);
                    continue;
                }
            };
            let commit = repo.find_commit(oid)?;
            let tree = commit.tree()?;
            let parent_tree = match commit.parent(0) {
                Ok(parent) => Some(parent.tree()?),
                Err(_) => None,
            };
            let mut opts = DiffOptions::new();
            let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

            let Some(modified_at) = DateTime::from_timestamp(commit.time().seconds(), 0) else {
                continue;
            };
            let author = commit.author().email().map(str::to_string);

            for delta in diff.deltas() {
                let Some(path) = delta.new_file().path() else {
                    continue;
                };
                let Some(rel) = strip_prefix(path, &prefix) else {
                    continue;
                };
                // Newest first: keep the first commit seen for each path.
                files.entry(rel).or_insert_with(|| FileHistory {
                    modified_at,
                    author: author.clone(),
                });
            }
        }

        let dirty = working_tree_changes(&repo, &prefix)?;
        tracing::debug!(
            "Loaded git history for {} files ({} changed since HEAD)",
            files.len(),
            dirty.len()
        );
        Ok(Some(Self {
            head: head.map(|oid| oid.to_string()),
            files,
            dirty,
        }))
    }

    /// HEAD commit id, if any commit exists.
    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// Root-relative paths that are modified, added, deleted or untracked
    /// relative to HEAD. Ignored files are not listed.
    pub fn dirty_paths(&self) -> &[String] {
        &self.dirty
    }

    pub fn file(&self, path: &str) -> Option<&FileHistory> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn working_tree_changes(repo: &Repository, prefix: &Path) -> Result<Vec<String>> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo
        .statuses(Some(&mut opts))
        .context("reading working tree status")?;

    let mut dirty: Vec<String> = statuses
        .iter()
        .filter(|entry| entry.status() != Status::CURRENT)
        .filter_map(|entry| strip_prefix(Path::new(entry.path()?), prefix))
        .collect();
    dirty.sort();
    Ok(dirty)
}

/// Path of `root` inside the work tree, empty when they are the same.
fn relative_prefix(root: &Path, workdir: &Path) -> PathBuf {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let workdir = workdir
        .canonicalize()
        .unwrap_or_else(|_| workdir.to_path_buf());
    root.strip_prefix(&workdir)
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

fn strip_prefix(path: &Path, prefix: &Path) -> Option<String> {
    let rel = path.strip_prefix(prefix).ok()?;
    Some(crate::source::normalize(rel))
}
