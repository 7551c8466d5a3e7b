//! Graph store contract and the in-memory implementation

use std::collections::BTreeSet;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::StoreResult;
use crate::fingerprint::Fingerprint;
use crate::model::{CallEdge, CodeUnit, RiskAlert, RiskType, UnitKey};

/// Reads and writes units, edges, alerts and the per-project revision marker.
///
/// Implementations must make `replace_edges` atomic per source unit: a reader
/// never observes a partially replaced edge set.
pub trait GraphStore: Send + Sync {
    /// Insert or update by identity. An existing `risk_score` is preserved.
    fn upsert_unit(&self, unit: &CodeUnit) -> StoreResult<()>;

    fn get_unit(&self, key: &UnitKey) -> StoreResult<Option<CodeUnit>>;

    fn get_unit_fingerprint(&self, key: &UnitKey) -> StoreResult<Option<Fingerprint>>;

    fn get_units(&self, project_id: &str) -> StoreResult<Vec<CodeUnit>>;

    fn get_edges(&self, project_id: &str) -> StoreResult<Vec<CallEdge>>;

    /// Replace the whole edge set of `source` with `targets`.
    fn replace_edges(&self, source: &UnitKey, targets: &BTreeSet<String>) -> StoreResult<()>;

    /// Delete one unit and its outgoing edges.
    fn delete_unit(&self, key: &UnitKey) -> StoreResult<()>;

    /// Delete every unit (and its edges) stored for `file_path`. Returns the
    /// number of units removed.
    fn delete_units_for_file(&self, project_id: &str, file_path: &str) -> StoreResult<usize>;

    /// Distinct file paths that currently own at least one unit.
    fn file_paths(&self, project_id: &str) -> StoreResult<BTreeSet<String>>;

    /// Unit names stored for one file.
    fn unit_names(&self, project_id: &str, file_path: &str) -> StoreResult<BTreeSet<String>>;

    fn set_risk_score(&self, key: &UnitKey, score: u8) -> StoreResult<()>;

    /// Drop every alert of `risk_type` for the project and store `alerts`.
    fn replace_alerts(
        &self,
        project_id: &str,
        risk_type: RiskType,
        alerts: &[RiskAlert],
    ) -> StoreResult<()>;

    fn get_alerts(&self, project_id: &str) -> StoreResult<Vec<RiskAlert>>;

    fn last_revision(&self, project_id: &str) -> StoreResult<Option<String>>;

    fn set_last_revision(&self, project_id: &str, revision: &str) -> StoreResult<()>;

    /// Take the project's run lock for `owner`. Returns `false` while another
    /// owner holds it. Locks live in the store, so they are shared by every
    /// process using it.
    fn try_lock(&self, project_id: &str, owner: &str) -> StoreResult<bool>;

    /// Release the run lock if `owner` holds it.
    fn unlock(&self, project_id: &str, owner: &str) -> StoreResult<()>;
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    units: DashMap<UnitKey, CodeUnit>,
    /// Source unit -> target names. One entry is swapped as a whole.
    edges: DashMap<UnitKey, BTreeSet<String>>,
    alerts: DashMap<String, Vec<RiskAlert>>,
    revisions: DashMap<String, String>,
    /// Project -> owner of its run lock.
    locks: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(|entry| entry.value().len()).sum()
    }
}

impl GraphStore for MemoryStore {
    fn upsert_unit(&self, unit: &CodeUnit) -> StoreResult<()> {
        self.units
            .entry(unit.key.clone())
            .and_modify(|existing| {
                let risk_score = existing.risk_score;
                *existing = unit.clone();
                existing.risk_score = risk_score;
            })
            .or_insert_with(|| unit.clone());
        Ok(())
    }

    fn get_unit(&self, key: &UnitKey) -> StoreResult<Option<CodeUnit>> {
        Ok(self.units.get(key).map(|r| r.value().clone()))
    }

    fn get_unit_fingerprint(&self, key: &UnitKey) -> StoreResult<Option<Fingerprint>> {
        Ok(self.units.get(key).map(|r| r.value().fingerprint))
    }

    fn get_units(&self, project_id: &str) -> StoreResult<Vec<CodeUnit>> {
        let mut units: Vec<CodeUnit> = self
            .units
            .iter()
            .filter(|r| r.key().project_id == project_id)
            .map(|r| r.value().clone())
            .collect();
        units.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(units)
    }

    fn get_edges(&self, project_id: &str) -> StoreResult<Vec<CallEdge>> {
        let mut edges: Vec<CallEdge> = self
            .edges
            .iter()
            .filter(|r| r.key().project_id == project_id)
            .flat_map(|r| {
                let source = r.key().clone();
                r.value()
                    .iter()
                    .map(move |target| CallEdge::new(source.clone(), target.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        edges.sort();
        Ok(edges)
    }

    fn replace_edges(&self, source: &UnitKey, targets: &BTreeSet<String>) -> StoreResult<()> {
        if targets.is_empty() {
            self.edges.remove(source);
        } else {
            self.edges.insert(source.clone(), targets.clone());
        }
        Ok(())
    }

    fn delete_unit(&self, key: &UnitKey) -> StoreResult<()> {
        self.edges.remove(key);
        self.units.remove(key);
        Ok(())
    }

    fn delete_units_for_file(&self, project_id: &str, file_path: &str) -> StoreResult<usize> {
        let doomed: Vec<UnitKey> = self
            .units
            .iter()
            .filter(|r| r.key().project_id == project_id && r.key().file_path == file_path)
            .map(|r| r.key().clone())
            .collect();
        for key in &doomed {
            self.delete_unit(key)?;
        }
        // Edge sets whose unit is already gone.
        self.edges
            .retain(|key, _| !(key.project_id == project_id && key.file_path == file_path));
        Ok(doomed.len())
    }

    fn file_paths(&self, project_id: &str) -> StoreResult<BTreeSet<String>> {
        Ok(self
            .units
            .iter()
            .filter(|r| r.key().project_id == project_id)
            .map(|r| r.key().file_path.clone())
            .collect())
    }

    fn unit_names(&self, project_id: &str, file_path: &str) -> StoreResult<BTreeSet<String>> {
        Ok(self
            .units
            .iter()
            .filter(|r| r.key().project_id == project_id && r.key().file_path == file_path)
            .map(|r| r.key().unit_name.clone())
            .collect())
    }

    fn set_risk_score(&self, key: &UnitKey, score: u8) -> StoreResult<()> {
        if let Some(mut unit) = self.units.get_mut(key) {
            unit.risk_score = score.min(100);
        }
        Ok(())
    }

    fn replace_alerts(
        &self,
        project_id: &str,
        risk_type: RiskType,
        alerts: &[RiskAlert],
    ) -> StoreResult<()> {
        let mut entry = self.alerts.entry(project_id.to_string()).or_default();
        entry.retain(|alert| alert.risk_type != risk_type);
        entry.extend(alerts.iter().cloned());
        Ok(())
    }

    fn get_alerts(&self, project_id: &str) -> StoreResult<Vec<RiskAlert>> {
        Ok(self
            .alerts
            .get(project_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    fn last_revision(&self, project_id: &str) -> StoreResult<Option<String>> {
        Ok(self.revisions.get(project_id).map(|r| r.value().clone()))
    }

    fn set_last_revision(&self, project_id: &str, revision: &str) -> StoreResult<()> {
        self.revisions
            .insert(project_id.to_string(), revision.to_string());
        Ok(())
    }

    fn try_lock(&self, project_id: &str, owner: &str) -> StoreResult<bool> {
        Ok(match self.locks.entry(project_id.to_string()) {
            Entry::Occupied(held) => held.get() == owner,
            Entry::Vacant(free) => {
                free.insert(owner.to_string());
                true
            }
        })
    }

    fn unlock(&self, project_id: &str, owner: &str) -> StoreResult<()> {
        self.locks.remove_if(project_id, |_, held| held == owner);
        Ok(())
    }
}
