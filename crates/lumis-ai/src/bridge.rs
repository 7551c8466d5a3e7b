//! Provider contract for summaries, embeddings and conflict reasoning

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Summary and embedding produced for one changed unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub summary: String,
    pub embedding: Vec<f32>,
}

/// One side of a dependency handed to the reasoning prompts.
#[derive(Debug, Clone, Copy)]
pub struct UnitView<'a> {
    /// `file_path::unit_name`
    pub identity: &'a str,
    pub source_text: &'a str,
    pub summary: Option<&'a str>,
}

/// AI provider trait for different LLM backends
#[async_trait::async_trait]
pub trait AIProvider: Send + Sync {
    /// One-sentence summary of a unit. `Ok(None)` means the unit is
    /// boilerplate and not worth describing.
    async fn summarize(&self, unit_name: &str, source_text: &str) -> Result<Option<String>>;

    /// Vector embedding of a unit's source.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Short characterization of the hazard when `recent` depends on `legacy`.
    async fn explain_conflict(&self, recent: UnitView<'_>, legacy: UnitView<'_>) -> Result<String>;

    /// A warning when the change to `changed` is likely to break `caller`,
    /// `Ok(None)` when the risk is low.
    async fn assess_impact(
        &self,
        changed: UnitView<'_>,
        caller: UnitView<'_>,
        caller_is_legacy: bool,
    ) -> Result<Option<String>>;

    /// Get provider name
    fn name(&self) -> &str;
}
