//! Local AI provider for offline enrichment
//!
//! Deterministic heuristics only: summaries from identifiers, hashed
//! bag-of-words embeddings, template explanations.

use anyhow::Result;
use lumis_core::Fingerprint;

use crate::bridge::{AIProvider, UnitView};

/// Dimension of the hashed embedding.
pub const EMBEDDING_DIM: usize = 64;

/// Tokens that carry no meaning on their own.
const NOISE: &[&str] = &[
    "def", "fn", "func", "function", "pub", "async", "await", "return", "pass", "none", "null",
    "nil", "undefined", "self", "this", "void", "int", "static", "const", "let", "var", "public",
    "private", "protected",
];

pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty() && !t.starts_with(|c: char| c.is_ascii_digit()))
}

fn meaningful_tokens<'a>(unit_name: &str, text: &'a str) -> Vec<&'a str> {
    tokens(text)
        .filter(|t| *t != unit_name && !NOISE.contains(&t.to_ascii_lowercase().as_str()))
        .collect()
}

/// Hash each lowercased token into one of `EMBEDDING_DIM` buckets with a
/// sign bit, then L2-normalize.
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for token in tokens(text) {
        let digest = Fingerprint::of(token.to_ascii_lowercase().as_bytes());
        let bytes = digest.as_bytes();
        let bucket = u16::from_le_bytes([bytes[0], bytes[1]]) as usize % EMBEDDING_DIM;
        let sign = if bytes[2] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[async_trait::async_trait]
impl AIProvider for LocalProvider {
    async fn summarize(&self, unit_name: &str, source_text: &str) -> Result<Option<String>> {
        let mut seen = Vec::new();
        for token in meaningful_tokens(unit_name, source_text) {
            if !seen.contains(&token) {
                seen.push(token);
            }
        }
        if seen.is_empty() {
            return Ok(None);
        }
        let lines = source_text.lines().count().max(1);
        let shown: Vec<&str> = seen.into_iter().take(3).collect();
        Ok(Some(format!(
            "{} is a {}-line unit working with {}.",
            unit_name,
            lines,
            shown.join(", ")
        )))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hashed_embedding(text))
    }

    async fn explain_conflict(&self, recent: UnitView<'_>, legacy: UnitView<'_>) -> Result<String> {
        Ok(format!(
            "'{}' changed recently and calls '{}', which has not changed in months; \
check that its arguments and return handling still match.",
            recent.identity, legacy.identity
        ))
    }

    async fn assess_impact(
        &self,
        changed: UnitView<'_>,
        caller: UnitView<'_>,
        caller_is_legacy: bool,
    ) -> Result<Option<String>> {
        Ok(caller_is_legacy.then(|| {
            format!(
                "Legacy caller '{}' may rely on behaviour changed in '{}'.",
                caller.identity, changed.identity
            )
        }))
    }

    fn name(&self) -> &str {
        "Local (Heuristic)"
    }
}
