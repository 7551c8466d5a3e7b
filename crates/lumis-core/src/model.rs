//! Core data structures for the code graph

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Composite identity of a unit: `(project_id, file_path, unit_name)`.
///
/// All three parts are opaque strings and are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub project_id: String,
    pub file_path: String,
    pub unit_name: String,
}

impl UnitKey {
    pub fn new(
        project_id: impl Into<String>,
        file_path: impl Into<String>,
        unit_name: impl Into<String>,
    ) -> Self {
        UnitKey {
            project_id: project_id.into(),
            file_path: file_path.into(),
            unit_name: unit_name.into(),
        }
    }

    /// Project-scoped identity string, `file_path::unit_name`.
    pub fn identity(&self) -> String {
        format!("{}::{}", self.file_path, self.unit_name)
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.file_path, self.unit_name)
    }
}

/// One callable definition (function or method).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub key: UnitKey,
    /// Verbatim text of the definition's byte range.
    pub source_text: String,
    pub fingerprint: Fingerprint,
    pub summary: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    /// 0–100. Stores never overwrite it on upsert.
    pub risk_score: u8,
}

impl CodeUnit {
    /// A fresh unit with no enrichment and no metadata.
    pub fn new(key: UnitKey, source_text: impl Into<String>) -> Self {
        let source_text = source_text.into();
        let fingerprint = Fingerprint::of(source_text.as_bytes());
        CodeUnit {
            key,
            source_text,
            fingerprint,
            summary: None,
            embedding: None,
            last_modified_at: None,
            author: None,
            risk_score: 0,
        }
    }

    pub fn with_metadata(
        mut self,
        last_modified_at: Option<DateTime<Utc>>,
        author: Option<String>,
    ) -> Self {
        self.last_modified_at = last_modified_at;
        self.author = author;
        self
    }
}

/// A directed, unresolved reference from a unit to a call-site identifier.
///
/// `target_name` is the raw trailing identifier at the call site and may not
/// match any stored unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallEdge {
    pub source: UnitKey,
    pub target_name: String,
}

impl CallEdge {
    pub fn new(source: UnitKey, target_name: impl Into<String>) -> Self {
        CallEdge {
            source,
            target_name: target_name.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.source.project_id
    }
}

/// Kinds of detected conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskType {
    /// A recent unit depends on a legacy unit.
    LegacyConflict,
    /// A changed unit is called by a unit whose assumptions it may break.
    ArchitecturalConflict,
}

impl RiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskType::LegacyConflict => "LegacyConflict",
            RiskType::ArchitecturalConflict => "ArchitecturalConflict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LegacyConflict" => Some(RiskType::LegacyConflict),
            "ArchitecturalConflict" => Some(RiskType::ArchitecturalConflict),
            _ => None,
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Low" => Some(Severity::Low),
            "Medium" => Some(Severity::Medium),
            "High" => Some(Severity::High),
            _ => None,
        }
    }
}

/// A conflict between a recently changed unit and one of its dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub project_id: String,
    pub risk_type: RiskType,
    pub severity: Severity,
    pub description: String,
    /// Ordered `(source, target)` unit identities.
    pub affected_units: (String, String),
    pub created_at: DateTime<Utc>,
}
