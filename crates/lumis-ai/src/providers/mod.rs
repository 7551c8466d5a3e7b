//! AI provider implementations

pub mod local;
pub mod openai;

use std::sync::Arc;

use anyhow::Result;
use lumis_core::AiConfig;

use crate::bridge::AIProvider;

/// Factory function to create AI providers
pub fn create_provider(config: &AiConfig) -> Result<Arc<dyn AIProvider>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = config.api_key();
            if api_key.is_none() {
                tracing::warn!(
                    "{} is not set; enrichment requests will fail and be skipped",
                    config.api_key_env
                );
            }
            Ok(Arc::new(
                openai::OpenAIProvider::new(api_key)
                    .with_base_url(&config.base_url)
                    .with_model(&config.model)
                    .with_embedding_model(&config.embedding_model),
            ))
        }
        "local" => Ok(Arc::new(local::LocalProvider::new())),
        other => anyhow::bail!("Unknown AI provider: {}", other),
    }
}
