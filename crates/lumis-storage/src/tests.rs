//! Unit tests for lumis-storage module

use std::collections::BTreeSet;

use chrono::{Duration, TimeZone, Utc};
use lumis_core::{CallEdge, CodeUnit, GraphStore, RiskAlert, RiskType, Severity, UnitKey};
use tempfile::TempDir;

use crate::*;

const PROJECT: &str = "demo";

fn store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join(".lumis").join("graph.db")).unwrap();
    (dir, store)
}

fn key(file: &str, name: &str) -> UnitKey {
    UnitKey::new(PROJECT, file, name)
}

fn unit(file: &str, name: &str, text: &str) -> CodeUnit {
    CodeUnit::new(key(file, name), text)
}

fn targets(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_open_creates_parent_dirs_and_reopens() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("graph.db");
    let store = SqliteStore::open(&path).unwrap();
    store.upsert_unit(&unit("a.py", "a", "def a(): b()")).unwrap();
    assert!(path.exists());

    // Schema creation is idempotent
    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.get_units(PROJECT).unwrap().len(), 1);
}

#[test]
fn test_unit_roundtrip_with_enrichment_and_metadata() {
    let (_dir, store) = store();
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let mut stored = unit("src/a.py", "a", "def a(): b()")
        .with_metadata(Some(ts), Some("Ada".to_string()));
    stored.summary = Some("Calls b.".to_string());
    stored.embedding = Some(vec![0.25, -0.5]);
    store.upsert_unit(&stored).unwrap();

    let loaded = store.get_unit(&stored.key).unwrap().unwrap();
    assert_eq!(loaded, stored);
    assert_eq!(
        store.get_unit_fingerprint(&stored.key).unwrap(),
        Some(stored.fingerprint)
    );
    assert!(store.get_unit(&key("src/a.py", "missing")).unwrap().is_none());
    assert!(store.get_unit_fingerprint(&key("src/a.py", "missing")).unwrap().is_none());
}

#[test]
fn test_upsert_preserves_risk_score_and_edges() {
    let (_dir, store) = store();
    let a = unit("a.py", "a", "def a(): b()");
    store.upsert_unit(&a).unwrap();
    store.replace_edges(&a.key, &targets(&["b"])).unwrap();
    store.set_risk_score(&a.key, 35).unwrap();

    store.upsert_unit(&unit("a.py", "a", "def a(): b(1)")).unwrap();
    let loaded = store.get_unit(&a.key).unwrap().unwrap();
    assert_eq!(loaded.risk_score, 35);
    assert_eq!(loaded.source_text, "def a(): b(1)");
    assert_eq!(store.get_edges(PROJECT).unwrap().len(), 1);
}

#[test]
fn test_replace_edges_swaps_whole_set() {
    let (_dir, store) = store();
    let a = unit("a.py", "a", "def a(): f(); g()");
    store.upsert_unit(&a).unwrap();
    store.replace_edges(&a.key, &targets(&["f", "g"])).unwrap();
    store.replace_edges(&a.key, &targets(&["g", "h"])).unwrap();

    let edges = store.get_edges(PROJECT).unwrap();
    assert_eq!(
        edges,
        vec![CallEdge::new(a.key.clone(), "g"), CallEdge::new(a.key.clone(), "h")]
    );

    store.replace_edges(&a.key, &BTreeSet::new()).unwrap();
    assert!(store.get_edges(PROJECT).unwrap().is_empty());
}

#[test]
fn test_delete_cascades_to_edges() {
    let (_dir, store) = store();
    for (file, name) in [("a.py", "a"), ("a.py", "b"), ("c.py", "c")] {
        let u = unit(file, name, &format!("def {}(): x()", name));
        store.upsert_unit(&u).unwrap();
        store.replace_edges(&u.key, &targets(&["x"])).unwrap();
    }

    store.delete_unit(&key("c.py", "c")).unwrap();
    assert_eq!(store.get_edges(PROJECT).unwrap().len(), 2);

    assert_eq!(store.delete_units_for_file(PROJECT, "a.py").unwrap(), 2);
    assert!(store.get_units(PROJECT).unwrap().is_empty());
    assert!(store.get_edges(PROJECT).unwrap().is_empty());
    assert_eq!(store.delete_units_for_file(PROJECT, "a.py").unwrap(), 0);
}

#[test]
fn test_listing_is_scoped_and_sorted() {
    let (_dir, store) = store();
    store.upsert_unit(&unit("b.py", "z", "def z(): pass")).unwrap();
    store.upsert_unit(&unit("a.py", "y", "def y(): pass")).unwrap();
    store.upsert_unit(&unit("a.py", "x", "def x(): pass")).unwrap();
    store
        .upsert_unit(&CodeUnit::new(UnitKey::new("other", "a.py", "x"), "def x(): pass"))
        .unwrap();

    let names: Vec<String> = store
        .get_units(PROJECT)
        .unwrap()
        .iter()
        .map(|u| u.key.identity())
        .collect();
    assert_eq!(names, vec!["a.py::x", "a.py::y", "b.py::z"]);
    assert_eq!(store.file_paths(PROJECT).unwrap(), targets(&["a.py", "b.py"]));
    assert_eq!(store.unit_names(PROJECT, "a.py").unwrap(), targets(&["x", "y"]));
    assert_eq!(store.get_units("other").unwrap().len(), 1);
}

#[test]
fn test_risk_score_is_capped() {
    let (_dir, store) = store();
    let a = unit("a.py", "a", "def a(): b()");
    store.upsert_unit(&a).unwrap();
    store.set_risk_score(&a.key, 250).unwrap();
    assert_eq!(store.get_unit(&a.key).unwrap().unwrap().risk_score, 100);

    // Unknown units are ignored
    store.set_risk_score(&key("a.py", "ghost"), 10).unwrap();
}

#[test]
fn test_replace_alerts_by_type() {
    let (_dir, store) = store();
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let alert = |risk_type, source: &str, target: &str| RiskAlert {
        project_id: PROJECT.to_string(),
        risk_type,
        severity: Severity::Medium,
        description: format!("{} -> {}", source, target),
        affected_units: (source.to_string(), target.to_string()),
        created_at,
    };

    store
        .replace_alerts(
            PROJECT,
            RiskType::LegacyConflict,
            &[alert(RiskType::LegacyConflict, "a.py::a", "a.py::b")],
        )
        .unwrap();
    store
        .replace_alerts(
            PROJECT,
            RiskType::ArchitecturalConflict,
            &[alert(RiskType::ArchitecturalConflict, "a.py::b", "a.py::a")],
        )
        .unwrap();
    assert_eq!(store.get_alerts(PROJECT).unwrap().len(), 2);

    store
        .replace_alerts(
            PROJECT,
            RiskType::LegacyConflict,
            &[alert(RiskType::LegacyConflict, "a.py::c", "a.py::b")],
        )
        .unwrap();
    let alerts = store.get_alerts(PROJECT).unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].risk_type, RiskType::ArchitecturalConflict);
    assert_eq!(alerts[1].affected_units.0, "a.py::c");
    assert_eq!(alerts[1].created_at, created_at);
}

#[test]
fn test_revision_marker() {
    let (_dir, store) = store();
    assert_eq!(store.last_revision(PROJECT).unwrap(), None);
    store.set_last_revision(PROJECT, "abc123").unwrap();
    store.set_last_revision(PROJECT, "def456").unwrap();
    assert_eq!(store.last_revision(PROJECT).unwrap(), Some("def456".to_string()));
    assert_eq!(store.last_revision("other").unwrap(), None);
}

#[test]
fn test_run_lock_is_shared_between_handles() {
    let (dir, store) = store();
    let other = SqliteStore::open(dir.path().join(".lumis").join("graph.db")).unwrap();

    assert!(store.try_lock(PROJECT, "first").unwrap());
    assert!(store.try_lock(PROJECT, "first").unwrap());
    assert!(!other.try_lock(PROJECT, "second").unwrap());
    assert!(other.try_lock("other", "second").unwrap());

    // Only the holder can release it.
    other.unlock(PROJECT, "second").unwrap();
    assert!(!other.try_lock(PROJECT, "second").unwrap());

    store.unlock(PROJECT, "first").unwrap();
    assert!(other.try_lock(PROJECT, "second").unwrap());
}

#[test]
fn test_abandoned_run_lock_is_taken_over() {
    let (dir, store) = store();
    let conn = rusqlite::Connection::open(dir.path().join(".lumis").join("graph.db")).unwrap();
    let long_ago = Utc::now().timestamp() - STALE_LOCK_SECS - 60;
    conn.execute(
        "INSERT INTO project_locks (project_id, owner, acquired_at) VALUES (?1, 'crashed', ?2);",
        rusqlite::params![PROJECT, long_ago],
    )
    .unwrap();

    assert!(store.try_lock(PROJECT, "fresh").unwrap());
}

#[test]
fn test_timestamps_keep_instant() {
    let (_dir, store) = store();
    let ts = Utc::now() - Duration::days(200);
    let stored = unit("a.py", "a", "def a(): pass").with_metadata(Some(ts), None);
    store.upsert_unit(&stored).unwrap();
    let loaded = store.get_unit(&stored.key).unwrap().unwrap();
    assert_eq!(loaded.last_modified_at, Some(ts));
}
