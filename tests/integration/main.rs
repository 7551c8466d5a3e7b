//! Integration tests for Lumis
//!
//! These drive the whole pipeline against real files: a git repository on
//! disk, the SQLite store and the local provider.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use git2::{Repository, Signature, Time};
use lumis_ai::EnrichmentGateway;
use lumis_ai::providers::local::LocalProvider;
use lumis_core::{GraphStore, LumisConfig, RiskType, UnitKey, default_db_path};
use lumis_indexer::{FsSource, ParserPool, UnitExtractor};
use lumis_storage::SqliteStore;
use lumis_sync::{
    JsonStatusStore, ProjectLock, RunState, StatusStore, SyncError, SyncReport, SyncScope,
    Synchronizer,
};
use tempfile::TempDir;

const PROJECT: &str = "demo";

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Write `rel` and commit it with a commit time `days_ago` days in the past.
fn commit_at(repo: &Repository, rel: &str, content: &str, days_ago: i64) {
    let root = repo.workdir().unwrap().to_path_buf();
    write_file(&root, rel, content);

    let seconds = (Utc::now() - chrono::Duration::days(days_ago)).timestamp();
    let sig = Signature::new("Tester", "tester@example.com", &Time::new(seconds, 0)).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(rel)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let parents: Vec<git2::Commit> = repo
        .head()
        .ok()
        .and_then(|h| h.peel_to_commit().ok())
        .into_iter()
        .collect();
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, rel, &tree, &parent_refs)
        .unwrap();
}

fn open_store(root: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(default_db_path(root)).unwrap())
}

/// One sync with a fresh source, so git history is reloaded.
async fn sync(root: &Path, store: &Arc<SqliteStore>, scope: SyncScope, force: bool) -> SyncReport {
    let config = LumisConfig::default();
    let source = FsSource::open(root, &config.scan).unwrap();
    let gateway = EnrichmentGateway::new(Arc::new(LocalProvider::new()), Duration::from_secs(5));
    let synchronizer = Synchronizer::new(
        store.clone(),
        Arc::new(source),
        UnitExtractor::new(ParserPool::new(2)),
        Arc::new(gateway),
        config.risk.clone(),
    )
    .with_status(Arc::new(JsonStatusStore::new(root.join(".lumis").join("status.json"))));
    synchronizer.run(PROJECT, scope, force).await.unwrap()
}

fn score(store: &SqliteStore, file: &str, name: &str) -> u8 {
    store
        .get_unit(&UnitKey::new(PROJECT, file, name))
        .unwrap()
        .unwrap()
        .risk_score
}

fn targets(store: &SqliteStore, file: &str, name: &str) -> Vec<String> {
    let source = UnitKey::new(PROJECT, file, name);
    store
        .get_edges(PROJECT)
        .unwrap()
        .into_iter()
        .filter(|e| e.source == source)
        .map(|e| e.target_name)
        .collect()
}

#[tokio::test]
async fn test_recent_caller_of_legacy_unit() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let store = open_store(dir.path());

    commit_at(&repo, "app.py", "def b():\n    pass\n", 200);
    sync(dir.path(), &store, SyncScope::Full, false).await;

    commit_at(
        &repo,
        "app.py",
        "def a():\n    b()\n\ndef b():\n    pass\n",
        5,
    );
    let report = sync(dir.path(), &store, SyncScope::Full, false).await;
    assert_eq!(report.units_changed, 1);

    let alerts = store.get_alerts(PROJECT).unwrap();
    let conflicts: Vec<_> = alerts
        .iter()
        .filter(|a| a.risk_type == RiskType::LegacyConflict)
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(
        conflicts[0].affected_units,
        ("app.py::a".to_string(), "app.py::b".to_string())
    );
    assert!(conflicts[0].description.contains("AI Analysis: "));
    assert_eq!(score(&store, "app.py", "a"), 25);
    assert_eq!(score(&store, "app.py", "b"), 20);

    let head = repo.head().unwrap().target().unwrap().to_string();
    assert_eq!(store.last_revision(PROJECT).unwrap(), Some(head));
}

#[tokio::test]
async fn test_unchanged_repository_resyncs_to_same_graph() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "src/app.py", "def a():\n    b()\n\ndef b():\n    pass\n");
    write_file(dir.path(), "src/util.js", "function fmt(x) { return pad(x); }\n");
    write_file(dir.path(), "node_modules/dep/index.js", "function dep() { other(); }\n");
    let store = open_store(dir.path());

    let first = sync(dir.path(), &store, SyncScope::Full, false).await;
    assert_eq!(first.files_processed, 2);
    let units = store.get_units(PROJECT).unwrap();
    let edges = store.get_edges(PROJECT).unwrap();

    let second = sync(dir.path(), &store, SyncScope::Full, true).await;
    assert_eq!(second.units_changed, 0);
    assert_eq!(second.units_enriched, 0);
    assert_eq!(store.get_units(PROJECT).unwrap(), units);
    assert_eq!(store.get_edges(PROJECT).unwrap(), edges);
    assert!(store.file_paths(PROJECT).unwrap().iter().all(|p| p.starts_with("src/")));
}

#[tokio::test]
async fn test_deleted_file_is_swept() {
    let dir = TempDir::new().unwrap();
    for (file, name) in [("A.py", "a"), ("B.py", "b"), ("C.py", "c")] {
        write_file(dir.path(), file, &format!("def {}():\n    shared()\n", name));
    }
    let store = open_store(dir.path());
    sync(dir.path(), &store, SyncScope::Full, false).await;
    assert_eq!(store.get_edges(PROJECT).unwrap().len(), 3);

    fs::remove_file(dir.path().join("B.py")).unwrap();
    let report = sync(dir.path(), &store, SyncScope::Full, false).await;
    assert_eq!(report.files_removed, 1);

    let files: Vec<String> = store.file_paths(PROJECT).unwrap().into_iter().collect();
    assert_eq!(files, vec!["A.py", "C.py"]);
    assert_eq!(store.get_edges(PROJECT).unwrap().len(), 2);
    assert_eq!(targets(&store, "A.py", "a"), vec!["shared"]);
}

#[tokio::test]
async fn test_call_targets_are_replaced_not_merged() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "svc.py", "def run():\n    f()\n    g()\n");
    let store = open_store(dir.path());
    sync(dir.path(), &store, SyncScope::Full, false).await;
    assert_eq!(targets(&store, "svc.py", "run"), vec!["f", "g"]);

    write_file(dir.path(), "svc.py", "def run():\n    g()\n    h()\n");
    sync(
        dir.path(),
        &store,
        SyncScope::Files(vec!["svc.py".to_string()]),
        false,
    )
    .await;
    assert_eq!(targets(&store, "svc.py", "run"), vec!["g", "h"]);
}

#[tokio::test]
async fn test_threshold_ages_are_not_classified() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_at(&repo, "old.py", "def old():\n    pass\n", 180);
    commit_at(&repo, "new.py", "def new():\n    old()\n", 30);
    let store = open_store(dir.path());

    let report = sync(dir.path(), &store, SyncScope::Full, false).await;
    let risk = report.risk.unwrap();
    assert_eq!(risk.legacy_units, 0);
    assert_eq!(risk.recent_units, 0);
    assert!(store.get_alerts(PROJECT).unwrap().is_empty());
    assert_eq!(score(&store, "old.py", "old"), 0);
    assert_eq!(score(&store, "new.py", "new"), 0);
}

#[tokio::test]
async fn test_one_recent_unit_calling_two_legacy_units() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_at(&repo, "legacy/t1.py", "def t1():\n    pass\n", 400);
    commit_at(&repo, "legacy/t2.py", "def t2():\n    pass\n", 200);
    commit_at(&repo, "s.py", "def s():\n    t1()\n    t2()\n", 3);
    let store = open_store(dir.path());

    sync(dir.path(), &store, SyncScope::Full, false).await;
    assert_eq!(score(&store, "s.py", "s"), 50);
    assert_eq!(score(&store, "legacy/t1.py", "t1"), 20);
    assert_eq!(score(&store, "legacy/t2.py", "t2"), 20);
    assert_eq!(store.get_alerts(PROJECT).unwrap().len(), 2);
}

#[tokio::test]
async fn test_same_revision_is_not_resynced() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_at(&repo, "app.py", "def a():\n    b()\n", 1);
    let store = open_store(dir.path());

    sync(dir.path(), &store, SyncScope::Full, false).await;
    let report = sync(dir.path(), &store, SyncScope::Full, false).await;
    assert!(report.already_synced);

    let status = JsonStatusStore::new(dir.path().join(".lumis").join("status.json"));
    let last = status.take(PROJECT);
    assert_eq!(last.state, RunState::Done);
    assert!(last.message.starts_with("already synced"));
}

#[tokio::test]
async fn test_uncommitted_edits_are_synced() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_at(&repo, "app.py", "def a():\n    b()\n", 1);
    let store = open_store(dir.path());
    sync(dir.path(), &store, SyncScope::Full, false).await;

    write_file(
        dir.path(),
        "app.py",
        "def a():\n    c()\n\ndef c():\n    pass\n",
    );
    let report = sync(dir.path(), &store, SyncScope::Full, false).await;
    assert!(!report.already_synced);
    assert_eq!(report.files_processed, 1);
    assert!(store
        .get_unit(&UnitKey::new(PROJECT, "app.py", "c"))
        .unwrap()
        .is_some());
    assert_eq!(targets(&store, "app.py", "a"), vec!["c"]);

    // Committing the edit makes the tree clean again; that revision is new.
    commit_at(&repo, "app.py", "def a():\n    c()\n\ndef c():\n    pass\n", 0);
    let committed = sync(dir.path(), &store, SyncScope::Full, false).await;
    assert!(!committed.already_synced);
    let again = sync(dir.path(), &store, SyncScope::Full, false).await;
    assert!(again.already_synced);
}

#[tokio::test]
async fn test_lock_held_by_another_handle_blocks_sync() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "app.py", "def a():\n    b()\n");
    let store = open_store(dir.path());
    let other: Arc<dyn GraphStore> = open_store(dir.path());

    let lock = ProjectLock::acquire(other.clone(), PROJECT).unwrap();
    let config = LumisConfig::default();
    let synchronizer = Synchronizer::new(
        store.clone(),
        Arc::new(FsSource::open(dir.path(), &config.scan).unwrap()),
        UnitExtractor::new(ParserPool::new(1)),
        Arc::new(EnrichmentGateway::new(
            Arc::new(LocalProvider::new()),
            Duration::from_secs(5),
        )),
        config.risk.clone(),
    );
    let err = synchronizer.run(PROJECT, SyncScope::Full, false).await.unwrap_err();
    assert!(matches!(err, SyncError::RunInProgress(_)));
    assert!(store.get_units(PROJECT).unwrap().is_empty());

    drop(lock);
    let report = synchronizer.run(PROJECT, SyncScope::Full, false).await.unwrap();
    assert_eq!(report.files_processed, 1);
}
