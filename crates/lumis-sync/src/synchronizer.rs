//! Differential synchronization of source files into the graph store
//!
//! A run walks through scanning, per-file processing, the orphan sweep (full
//! runs only), risk analysis and finally the revision marker. Per-file and
//! per-unit failures are logged and skipped; source and store failures abort
//! the run before the revision marker moves.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use lumis_ai::EnrichmentGateway;
use lumis_core::{CodeUnit, Fingerprint, GraphStore, RiskConfig, UnitKey};
use lumis_indexer::{ExtractedUnit, SourceProvider, UnitExtractor, route};
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::lease::ProjectLock;
use crate::risk::{RiskEngine, RiskReport};
use crate::session::ScanSession;
use crate::status::{MemoryStatusStore, Stage, StatusStore};

/// Which files a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every eligible file; stored files not seen are swept.
    Full,
    /// Only the named paths; nothing else is touched.
    Files(Vec<String>),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub project_id: String,
    pub revision: Option<String>,
    /// Set when the stored revision already matched and nothing ran.
    pub already_synced: bool,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_removed: usize,
    pub units_seen: usize,
    pub units_changed: usize,
    pub units_enriched: usize,
    pub units_removed: usize,
    pub edges_written: usize,
    pub risk: Option<RiskReport>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.already_synced {
            return write!(
                f,
                "already synced at {}",
                self.revision.as_deref().unwrap_or("unknown revision")
            );
        }
        write!(
            f,
            "{} files, {} units ({} changed, {} enriched, {} removed), {} edges",
            self.files_processed,
            self.units_seen,
            self.units_changed,
            self.units_enriched,
            self.units_removed,
            self.edges_written
        )?;
        if self.files_skipped > 0 {
            write!(f, ", {} files skipped", self.files_skipped)?;
        }
        if self.files_removed > 0 {
            write!(f, ", {} files removed", self.files_removed)?;
        }
        Ok(())
    }
}

enum FileOutcome {
    Synced { changed: Vec<UnitKey> },
    Skipped,
    Removed,
}

pub struct Synchronizer {
    store: Arc<dyn GraphStore>,
    source: Arc<dyn SourceProvider>,
    extractor: UnitExtractor,
    gateway: Arc<EnrichmentGateway>,
    risk: RiskEngine,
    status: Arc<dyn StatusStore>,
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn GraphStore>,
        source: Arc<dyn SourceProvider>,
        extractor: UnitExtractor,
        gateway: Arc<EnrichmentGateway>,
        risk_config: RiskConfig,
    ) -> Self {
        let risk = RiskEngine::new(store.clone(), gateway.clone(), risk_config);
        Self {
            store,
            source,
            extractor,
            gateway,
            risk,
            status: Arc::new(MemoryStatusStore::new()),
        }
    }

    pub fn with_status(mut self, status: Arc<dyn StatusStore>) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> &Arc<dyn StatusStore> {
        &self.status
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    /// Run one synchronization pass. `force` ignores the already-synced
    /// check of full runs.
    pub async fn run(&self, project_id: &str, scope: SyncScope, force: bool) -> SyncResult<SyncReport> {
        let _lock = ProjectLock::acquire(self.store.clone(), project_id)?;

        self.status.begin(project_id);
        match self.execute(project_id, scope, force).await {
            Ok(report) => {
                info!("Sync of {} finished: {}", project_id, report);
                self.status.complete(project_id, &report.to_string());
                Ok(report)
            }
            Err(e) => {
                error!("Sync of {} failed: {}", project_id, e);
                self.status.fail(project_id, &e.to_string());
                Err(e)
            }
        }
    }

    async fn execute(&self, project_id: &str, scope: SyncScope, force: bool) -> SyncResult<SyncReport> {
        let revision = self.source.revision();
        let mut report = SyncReport {
            project_id: project_id.to_string(),
            revision: revision.clone(),
            ..Default::default()
        };

        if scope == SyncScope::Full && !force {
            if let Some(current) = &revision {
                if self.store.last_revision(project_id)?.as_ref() == Some(current) {
                    info!("Project {} already synced at {}", project_id, current);
                    report.already_synced = true;
                    return Ok(report);
                }
            }
        }

        self.status.advance(project_id, Stage::Scanning, "listing files");
        let session = match scope {
            SyncScope::Full => {
                let listed = self
                    .source
                    .list_files()
                    .map_err(|e| SyncError::unavailable(&e))?;
                ScanSession::full(project_id, listed, revision)
            }
            SyncScope::Files(paths) => ScanSession::delta(project_id, paths, revision),
        };
        info!(
            "Syncing {} ({} files, {})",
            project_id,
            session.files.len(),
            if session.full { "full" } else { "delta" }
        );

        self.status.advance(
            project_id,
            Stage::Processing,
            &format!("{} files", session.files.len()),
        );
        let mut changed = Vec::new();
        for path in &session.files {
            match self.sync_file(project_id, path, &mut report).await? {
                FileOutcome::Synced { changed: keys } => {
                    report.files_processed += 1;
                    changed.extend(keys);
                }
                FileOutcome::Skipped => report.files_skipped += 1,
                FileOutcome::Removed => report.files_removed += 1,
            }
        }

        if session.full {
            self.status
                .advance(project_id, Stage::SweepingOrphans, "removing deleted files");
            let stored = self.store.file_paths(project_id)?;
            for orphan in session.orphans(&stored) {
                let removed = self.store.delete_units_for_file(project_id, &orphan)?;
                debug!("Swept {} units of deleted file {}", removed, orphan);
                report.files_removed += 1;
                report.units_removed += removed;
            }
        }

        self.status
            .advance(project_id, Stage::AnalyzingRisk, "propagating risk");
        report.risk = Some(self.risk.analyze(project_id, &changed, Utc::now()).await?);

        // Only a fully successful run may mark its revision as synced.
        self.status
            .advance(project_id, Stage::Finalizing, "recording revision");
        if let Some(revision) = &session.revision {
            self.store.set_last_revision(project_id, revision)?;
        }
        Ok(report)
    }

    async fn sync_file(
        &self,
        project_id: &str,
        path: &str,
        report: &mut SyncReport,
    ) -> SyncResult<FileOutcome> {
        let Some(grammar) = route(Path::new(path)) else {
            debug!("No grammar for {}", path);
            return Ok(FileOutcome::Skipped);
        };

        let content = match self.source.read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let removed = self.store.delete_units_for_file(project_id, path)?;
                info!("{} no longer exists; removed {} units", path, removed);
                report.units_removed += removed;
                return Ok(FileOutcome::Removed);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path, e);
                return Ok(FileOutcome::Skipped);
            }
        };

        let extracted = match self.extractor.extract(grammar, &content).await {
            Ok(units) => units,
            Err(e) => {
                warn!("Skipping {}: {:#}", path, e);
                return Ok(FileOutcome::Skipped);
            }
        };

        // A later definition with the same name replaces an earlier one.
        let units: BTreeMap<String, ExtractedUnit> = extracted
            .into_iter()
            .map(|unit| (unit.name.clone(), unit))
            .collect();

        let metadata = self.source.last_modified(path);
        let mut changed = Vec::new();
        for (name, unit) in &units {
            let key = UnitKey::new(project_id, path, name);
            report.units_seen += 1;

            let fingerprint = Fingerprint::of(unit.source_text.as_bytes());
            let stored = self.store.get_unit_fingerprint(&key)?;
            if stored != Some(fingerprint) {
                let previous = match stored {
                    Some(_) => self.store.get_unit(&key)?,
                    None => None,
                };
                let mut record = CodeUnit::new(key.clone(), unit.source_text.clone());
                match &metadata {
                    Some(meta) => {
                        record = record.with_metadata(Some(meta.modified_at), meta.author.clone());
                    }
                    None => {
                        if let Some(prev) = &previous {
                            record = record
                                .with_metadata(prev.last_modified_at, prev.author.clone());
                        }
                    }
                }

                match self.gateway.enrich(&unit.source_text, name).await {
                    Some(enrichment) => {
                        record.summary = Some(enrichment.summary);
                        record.embedding = Some(enrichment.embedding);
                        report.units_enriched += 1;
                    }
                    None => {
                        if let Some(prev) = previous {
                            record.summary = prev.summary;
                            record.embedding = prev.embedding;
                        }
                    }
                }

                self.store.upsert_unit(&record)?;
                report.units_changed += 1;
                changed.push(key.clone());
            }

            self.store.replace_edges(&key, &unit.calls)?;
            report.edges_written += unit.calls.len();
        }

        let current: BTreeSet<&str> = units.keys().map(String::as_str).collect();
        for stale in self.store.unit_names(project_id, path)? {
            if !current.contains(stale.as_str()) {
                self.store
                    .delete_unit(&UnitKey::new(project_id, path, stale.as_str()))?;
                debug!("Removed stale unit {}::{}", path, stale);
                report.units_removed += 1;
            }
        }

        Ok(FileOutcome::Synced { changed })
    }
}
