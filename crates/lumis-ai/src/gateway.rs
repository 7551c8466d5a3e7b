//! Enrichment gateway: bounded, failure-tolerant access to a provider
//!
//! Every call is wrapped in a timeout and checked against an optional token
//! budget. Timeouts, provider errors and an exhausted budget all degrade to
//! "no result"; nothing here returns an error to the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use lumis_core::AiConfig;

use crate::bridge::{AIProvider, Enrichment, UnitView};
use crate::budget::{BudgetLevel, Charge, TokenBudget};
use crate::prompt;
use crate::providers;

pub struct EnrichmentGateway {
    provider: Arc<dyn AIProvider>,
    timeout: Duration,
    budget: Option<Mutex<TokenBudget>>,
}

impl EnrichmentGateway {
    pub fn new(provider: Arc<dyn AIProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            budget: None,
        }
    }

    pub fn with_budget(mut self, total_tokens: usize) -> Self {
        self.budget = Some(Mutex::new(TokenBudget::new(total_tokens)));
        self
    }

    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let provider = providers::create_provider(config)?;
        let gateway = Self::new(provider, Duration::from_secs(config.timeout_secs));
        Ok(match config.token_budget {
            Some(tokens) => gateway.with_budget(tokens),
            None => gateway,
        })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Tokens charged so far, when a budget is set.
    pub fn tokens_used(&self) -> Option<usize> {
        self.budget
            .as_ref()
            .map(|b| b.lock().unwrap_or_else(|e| e.into_inner()).spent())
    }

    /// Summary and embedding for a changed unit, or `None` when the provider
    /// skips it, fails, times out, or the budget is spent.
    pub async fn enrich(&self, source_text: &str, unit_name: &str) -> Option<Enrichment> {
        let cost = prompt::SUMMARY_SYSTEM_PROMPT.len() + source_text.len() + unit_name.len();
        if !self.charge(cost) {
            return None;
        }

        let summary = self
            .bounded("summarize", unit_name, self.provider.summarize(unit_name, source_text))
            .await??;
        if prompt::is_skip(&summary) {
            tracing::debug!("Enrichment skipped {} as boilerplate", unit_name);
            return None;
        }

        let embedding = self
            .bounded("embed", unit_name, self.provider.embed(source_text))
            .await?;
        Some(Enrichment { summary, embedding })
    }

    /// Explanation for a legacy conflict. Falls back to a generic sentence.
    pub async fn explain(&self, recent: UnitView<'_>, legacy: UnitView<'_>) -> String {
        let cost = prompt::CONFLICT_SYSTEM_PROMPT.len()
            + recent.source_text.len()
            + legacy.source_text.len();
        if !self.charge(cost) {
            return prompt::FALLBACK_EXPLANATION.to_string();
        }

        self.bounded(
            "explain",
            recent.identity,
            self.provider.explain_conflict(recent, legacy),
        )
        .await
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| prompt::FALLBACK_EXPLANATION.to_string())
    }

    /// Warning text when `changed` likely breaks `caller`.
    pub async fn assess_impact(
        &self,
        changed: UnitView<'_>,
        caller: UnitView<'_>,
        caller_is_legacy: bool,
    ) -> Option<String> {
        let cost = prompt::IMPACT_SYSTEM_PROMPT.len()
            + changed.summary.unwrap_or(changed.source_text).len()
            + caller.summary.unwrap_or(caller.source_text).len();
        if !self.charge(cost) {
            return None;
        }

        self.bounded(
            "assess",
            changed.identity,
            self.provider.assess_impact(changed, caller, caller_is_legacy),
        )
        .await
        .flatten()
        .and_then(|raw| prompt::usable_assessment(&raw))
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        subject: &str,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(
                    "{} failed for {} via {}: {:#}",
                    operation,
                    subject,
                    self.provider.name(),
                    e
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    "{} timed out for {} after {:?}",
                    operation,
                    subject,
                    self.timeout
                );
                None
            }
        }
    }

    /// Reserve the estimated cost of a prompt of `prompt_len` characters.
    fn charge(&self, prompt_len: usize) -> bool {
        let Some(budget) = &self.budget else {
            return true;
        };
        let mut budget = budget.lock().unwrap_or_else(|e| e.into_inner());
        let before = budget.level();
        match budget.charge(prompt_len) {
            Charge::Granted { level, .. } => {
                if level == BudgetLevel::Exhausted && before != BudgetLevel::Exhausted {
                    tracing::warn!(
                        "Token budget nearly spent ({} remaining); further AI calls will be skipped",
                        budget.remaining()
                    );
                }
                true
            }
            Charge::Refused { cost, remaining } => {
                tracing::debug!(
                    "Token budget insufficient ({} remaining, {} needed); skipping AI call",
                    remaining,
                    cost
                );
                false
            }
        }
    }
}
