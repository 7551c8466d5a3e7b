//! Risk propagation over the stored unit graph
//!
//! Units are classified by age, recent-to-legacy calls become
//! `LegacyConflict` alerts, and scores accumulate per unit:
//!
//! * +25 to the recent caller and +10 to the legacy callee, per conflicting call
//! * +10 to every legacy unit
//! * capped at 100; only nonzero scores are written
//!
//! Changed units are also checked against their callers, which yields
//! `ArchitecturalConflict` alerts when the provider sees a likely break.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lumis_ai::{EnrichmentGateway, UnitView};
use lumis_core::{
    CallGraph, CodeUnit, GraphStore, RiskAlert, RiskConfig, RiskType, Severity, UnitKey,
};
use tracing::{debug, info};

use crate::error::SyncResult;

pub const CONFLICT_SOURCE_POINTS: u32 = 25;
pub const CONFLICT_TARGET_POINTS: u32 = 10;
pub const LEGACY_BASELINE_POINTS: u32 = 10;
pub const MAX_RISK_SCORE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeClass {
    Legacy,
    Recent,
    Unclassified,
}

/// Classify by whole days since the last modification. Both thresholds are
/// strict, so a unit exactly at either boundary is unclassified.
pub fn classify(unit: &CodeUnit, now: DateTime<Utc>, config: &RiskConfig) -> AgeClass {
    let Some(modified_at) = unit.last_modified_at else {
        return AgeClass::Unclassified;
    };
    let age_days = (now - modified_at).num_days();
    if age_days > config.legacy_threshold_days {
        AgeClass::Legacy
    } else if age_days < config.recent_threshold_days {
        AgeClass::Recent
    } else {
        AgeClass::Unclassified
    }
}

/// One call from a recent unit into a legacy unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub recent: UnitKey,
    pub legacy: UnitKey,
}

/// Pure result of risk propagation.
#[derive(Debug, Default, Clone)]
pub struct RiskAssessment {
    pub classes: HashMap<UnitKey, AgeClass>,
    /// One entry per conflicting stored edge, in edge order.
    pub conflicts: Vec<Conflict>,
    /// Final capped scores, nonzero only.
    pub scores: BTreeMap<UnitKey, u8>,
}

impl RiskAssessment {
    pub fn count(&self, class: AgeClass) -> usize {
        self.classes.values().filter(|c| **c == class).count()
    }

    pub fn class_of(&self, key: &UnitKey) -> AgeClass {
        self.classes
            .get(key)
            .copied()
            .unwrap_or(AgeClass::Unclassified)
    }
}

/// Classify every unit, find conflicts along resolved calls and score units.
pub fn propagate(
    units: &[CodeUnit],
    graph: &CallGraph,
    now: DateTime<Utc>,
    config: &RiskConfig,
) -> RiskAssessment {
    let classes: HashMap<UnitKey, AgeClass> = units
        .iter()
        .map(|unit| (unit.key.clone(), classify(unit, now, config)))
        .collect();
    let class_of = |key: &UnitKey| classes.get(key).copied().unwrap_or(AgeClass::Unclassified);

    let mut points: HashMap<&UnitKey, u32> = HashMap::new();
    let mut conflicts = Vec::new();
    for (source, target) in graph.resolved_calls() {
        if class_of(source) == AgeClass::Recent && class_of(target) == AgeClass::Legacy {
            *points.entry(source).or_default() += CONFLICT_SOURCE_POINTS;
            *points.entry(target).or_default() += CONFLICT_TARGET_POINTS;
            conflicts.push(Conflict {
                recent: source.clone(),
                legacy: target.clone(),
            });
        }
    }

    let mut scores = BTreeMap::new();
    for unit in units {
        let mut score = points.get(&unit.key).copied().unwrap_or(0);
        if class_of(&unit.key) == AgeClass::Legacy {
            score += LEGACY_BASELINE_POINTS;
        }
        let score = score.min(MAX_RISK_SCORE);
        if score > 0 {
            scores.insert(unit.key.clone(), score as u8);
        }
    }

    RiskAssessment {
        classes,
        conflicts,
        scores,
    }
}

/// Counts from one risk pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RiskReport {
    pub legacy_units: usize,
    pub recent_units: usize,
    pub legacy_conflicts: usize,
    pub scored_units: usize,
    /// `None` when impact analysis did not run.
    pub impact_alerts: Option<usize>,
}

fn view<'a>(unit: &'a CodeUnit, identity: &'a str) -> UnitView<'a> {
    UnitView {
        identity,
        source_text: &unit.source_text,
        summary: unit.summary.as_deref(),
    }
}

/// Runs risk propagation and impact analysis against a store.
pub struct RiskEngine {
    store: Arc<dyn GraphStore>,
    gateway: Arc<EnrichmentGateway>,
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        gateway: Arc<EnrichmentGateway>,
        config: RiskConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Recompute conflicts and scores over the whole project. When `changed`
    /// is non-empty, callers of those units are assessed as well and the
    /// `ArchitecturalConflict` alerts are replaced.
    pub async fn analyze(
        &self,
        project_id: &str,
        changed: &[UnitKey],
        now: DateTime<Utc>,
    ) -> SyncResult<RiskReport> {
        let units = self.store.get_units(project_id)?;
        let edges = self.store.get_edges(project_id)?;
        let graph = CallGraph::build(&units, &edges);
        let assessment = propagate(&units, &graph, now, &self.config);
        let by_key: HashMap<&UnitKey, &CodeUnit> = units.iter().map(|u| (&u.key, u)).collect();

        debug!(
            "Risk graph for {}: {} units, {} resolved calls, {} unresolved",
            project_id,
            graph.node_count(),
            graph.edge_count(),
            graph.unresolved_count()
        );

        let alerts = self
            .conflict_alerts(project_id, &assessment, &by_key, now)
            .await;
        self.store
            .replace_alerts(project_id, RiskType::LegacyConflict, &alerts)?;
        for (key, score) in &assessment.scores {
            self.store.set_risk_score(key, *score)?;
        }

        let impact_alerts = if changed.is_empty() {
            None
        } else {
            let impact = self
                .impact_alerts(project_id, changed, &graph, &assessment, &by_key, now)
                .await;
            self.store
                .replace_alerts(project_id, RiskType::ArchitecturalConflict, &impact)?;
            Some(impact.len())
        };

        let report = RiskReport {
            legacy_units: assessment.count(AgeClass::Legacy),
            recent_units: assessment.count(AgeClass::Recent),
            legacy_conflicts: alerts.len(),
            scored_units: assessment.scores.len(),
            impact_alerts,
        };
        info!(
            "Risk analysis for {}: {} legacy, {} recent, {} conflicts",
            project_id, report.legacy_units, report.recent_units, report.legacy_conflicts
        );
        Ok(report)
    }

    async fn conflict_alerts(
        &self,
        project_id: &str,
        assessment: &RiskAssessment,
        by_key: &HashMap<&UnitKey, &CodeUnit>,
        now: DateTime<Utc>,
    ) -> Vec<RiskAlert> {
        // A pair reached through several call sites is explained once.
        let mut explanations: HashMap<(&UnitKey, &UnitKey), String> = HashMap::new();
        let mut alerts = Vec::with_capacity(assessment.conflicts.len());

        for conflict in &assessment.conflicts {
            let (Some(recent), Some(legacy)) =
                (by_key.get(&conflict.recent), by_key.get(&conflict.legacy))
            else {
                continue;
            };
            let recent_id = conflict.recent.identity();
            let legacy_id = conflict.legacy.identity();

            let pair = (&conflict.recent, &conflict.legacy);
            let analysis = match explanations.get(&pair) {
                Some(text) => text.clone(),
                None => {
                    let text = self
                        .gateway
                        .explain(view(recent, &recent_id), view(legacy, &legacy_id))
                        .await;
                    explanations.insert(pair, text.clone());
                    text
                }
            };

            let last_touched = legacy
                .last_modified_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            alerts.push(RiskAlert {
                project_id: project_id.to_string(),
                risk_type: RiskType::LegacyConflict,
                severity: Severity::Medium,
                description: format!(
                    "Legacy Conflict: Active code '{}' depends on '{}' (last touched {}).\nAI Analysis: {}",
                    recent_id, legacy_id, last_touched, analysis
                ),
                affected_units: (recent_id, legacy_id),
                created_at: now,
            });
        }
        alerts
    }

    async fn impact_alerts(
        &self,
        project_id: &str,
        changed: &[UnitKey],
        graph: &CallGraph,
        assessment: &RiskAssessment,
        by_key: &HashMap<&UnitKey, &CodeUnit>,
        now: DateTime<Utc>,
    ) -> Vec<RiskAlert> {
        let mut alerts = Vec::new();
        for key in changed {
            let Some(changed_unit) = by_key.get(key) else {
                continue;
            };
            let changed_id = key.identity();
            for caller in graph.callers(key) {
                if caller == key {
                    continue;
                }
                let Some(caller_unit) = by_key.get(caller) else {
                    continue;
                };
                let caller_id = caller.identity();
                let caller_is_legacy = assessment.class_of(caller) == AgeClass::Legacy;

                let Some(warning) = self
                    .gateway
                    .assess_impact(
                        view(changed_unit, &changed_id),
                        view(caller_unit, &caller_id),
                        caller_is_legacy,
                    )
                    .await
                else {
                    continue;
                };

                debug!("Impact: {} -> {}", changed_id, caller_id);
                alerts.push(RiskAlert {
                    project_id: project_id.to_string(),
                    risk_type: RiskType::ArchitecturalConflict,
                    severity: if caller_is_legacy {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    description: format!(
                        "Architectural Conflict: change in '{}' may break caller '{}'.\nAI Analysis: {}",
                        changed_id, caller_id, warning
                    ),
                    affected_units: (changed_id.clone(), caller_id),
                    created_at: now,
                });
            }
        }
        alerts
    }
}
