//! The file set one synchronization run works over

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use lumis_indexer::route;

/// Files selected by the scan stage, with the revision they were read at.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub project_id: String,
    /// Routable files, sorted and unique.
    pub files: Vec<String>,
    /// Whether `files` is the complete eligible set of the project.
    pub full: bool,
    pub revision: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl ScanSession {
    /// A complete scan. Only files with a supported grammar are kept.
    pub fn full(project_id: &str, listed: Vec<String>, revision: Option<String>) -> Self {
        Self::new(project_id, listed, true, revision)
    }

    /// A delta over explicitly named files.
    pub fn delta(project_id: &str, named: Vec<String>, revision: Option<String>) -> Self {
        Self::new(project_id, named, false, revision)
    }

    fn new(project_id: &str, paths: Vec<String>, full: bool, revision: Option<String>) -> Self {
        let files: BTreeSet<String> = paths
            .into_iter()
            .map(|p| p.trim_start_matches("./").to_string())
            .filter(|p| route(Path::new(p)).is_some())
            .collect();
        ScanSession {
            project_id: project_id.to_string(),
            files: files.into_iter().collect(),
            full,
            revision,
            started_at: Utc::now(),
        }
    }

    /// Stored file paths absent from this scan. Always empty for a delta.
    pub fn orphans(&self, stored: &BTreeSet<String>) -> Vec<String> {
        if !self.full {
            return Vec::new();
        }
        stored
            .iter()
            .filter(|path| self.files.binary_search(*path).is_err())
            .cloned()
            .collect()
    }
}
