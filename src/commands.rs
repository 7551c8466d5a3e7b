//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use lumis_ai::EnrichmentGateway;
use lumis_core::{GraphStore, LumisConfig, cache_dir};
use lumis_indexer::source::normalize;
use lumis_indexer::{FsSource, UnitExtractor, create_parser_pool};
use lumis_storage::SqliteStore;
use lumis_sync::{JsonStatusStore, ProjectLock, RiskEngine, StatusStore, SyncScope, Synchronizer};

const STATUS_FILE: &str = "status.json";

/// Configuration and stores for one repository root.
struct Workspace {
    root: PathBuf,
    config: LumisConfig,
    store: Arc<SqliteStore>,
}

impl Workspace {
    fn open(root: &Path) -> anyhow::Result<Self> {
        let config = LumisConfig::load(root)?;
        let db_path = config.store_path(root);
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("opening graph store {}", db_path.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
            store: Arc::new(store),
        })
    }

    fn status_store(&self) -> Arc<JsonStatusStore> {
        Arc::new(JsonStatusStore::new(cache_dir(&self.root).join(STATUS_FILE)))
    }

    fn gateway(&self) -> anyhow::Result<Arc<EnrichmentGateway>> {
        let gateway = EnrichmentGateway::from_config(&self.config.ai)?;
        tracing::info!("Using AI provider: {}", gateway.provider_name());
        Ok(Arc::new(gateway))
    }
}

/// The explicit project id, or the name of the root directory.
pub fn project_id(root: &Path, explicit: Option<&str>) -> String {
    if let Some(project) = explicit {
        return project.to_string();
    }
    std::fs::canonicalize(root)
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}

/// Express a user-supplied path relative to the root.
fn relative_to_root(root: &Path, file: &str) -> String {
    let path = Path::new(file);
    let canonical_root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let relative = if path.is_absolute() {
        path.strip_prefix(&canonical_root)
            .or_else(|_| path.strip_prefix(root))
            .unwrap_or(path)
    } else {
        path
    };
    normalize(relative)
}

pub async fn sync(root: PathBuf, project: String, files: Vec<String>, force: bool) -> anyhow::Result<()> {
    tracing::info!("Syncing {} from {}", project, root.display());

    let workspace = Workspace::open(&root)?;
    let source = FsSource::open(&root, &workspace.config.scan)?;
    let synchronizer = Synchronizer::new(
        workspace.store.clone(),
        Arc::new(source),
        UnitExtractor::new(create_parser_pool()),
        workspace.gateway()?,
        workspace.config.risk.clone(),
    )
    .with_status(workspace.status_store());

    let scope = if files.is_empty() {
        SyncScope::Full
    } else {
        SyncScope::Files(files.iter().map(|f| relative_to_root(&root, f)).collect())
    };

    let report = synchronizer.run(&project, scope, force).await?;
    println!("{}: {}", project, report);
    if let Some(risk) = &report.risk {
        println!(
            "Risk: {} legacy units, {} recent units, {} legacy conflicts",
            risk.legacy_units, risk.recent_units, risk.legacy_conflicts
        );
        if let Some(impact) = risk.impact_alerts {
            println!("Impact: {} callers flagged", impact);
        }
    }
    Ok(())
}

pub async fn risk(root: PathBuf, project: String) -> anyhow::Result<()> {
    let workspace = Workspace::open(&root)?;
    // A sync of the same project rewrites scores and alerts too.
    let _lock = ProjectLock::acquire(workspace.store.clone(), &project)?;
    let engine = RiskEngine::new(
        workspace.store.clone(),
        workspace.gateway()?,
        workspace.config.risk.clone(),
    );
    let report = engine.analyze(&project, &[], Utc::now()).await?;
    println!(
        "{}: {} legacy units, {} recent units, {} legacy conflicts, {} units scored",
        project, report.legacy_units, report.recent_units, report.legacy_conflicts, report.scored_units
    );
    Ok(())
}

pub fn alerts(root: PathBuf, project: String) -> anyhow::Result<()> {
    let workspace = Workspace::open(&root)?;
    let alerts = workspace.store.get_alerts(&project)?;
    if alerts.is_empty() {
        println!("No risk alerts for {}", project);
        return Ok(());
    }
    for alert in alerts {
        println!(
            "[{} / {}] {} -> {}",
            alert.risk_type,
            alert.severity.as_str(),
            alert.affected_units.0,
            alert.affected_units.1
        );
        for line in alert.description.lines() {
            println!("    {}", line);
        }
    }
    Ok(())
}

pub fn units(root: PathBuf, project: String, limit: usize) -> anyhow::Result<()> {
    let workspace = Workspace::open(&root)?;
    let mut units = workspace.store.get_units(&project)?;
    units.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then_with(|| a.key.cmp(&b.key)));

    println!("{} units in {}", units.len(), project);
    for unit in units.iter().take(limit) {
        let modified = unit
            .last_modified_at
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}  {}  {}  {}",
            unit.risk_score,
            modified,
            unit.key,
            unit.summary.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn status(root: PathBuf, project: String) -> anyhow::Result<()> {
    let status = JsonStatusStore::new(cache_dir(&root).join(STATUS_FILE)).take(&project);
    println!("{}: {}", project, status);
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing cache for: {}", root.display());

    lumis_core::clear_cache(&root)?;

    tracing::info!("Cache cleared");
    Ok(())
}
