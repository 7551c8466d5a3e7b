//! OpenAI-compatible provider (OpenAI, OpenRouter, local gateways)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bridge::{AIProvider, UnitView};
use crate::prompt;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key
                .unwrap_or_else(|| std::env::var("OPENAI_API_KEY").unwrap_or_default()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// POST `body` to `{base_url}/{endpoint}` and decode the JSON reply.
    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("sending {} request", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("{} returned {}: {}", endpoint, status, detail);
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding {} response", endpoint))
    }

    async fn chat(&self, system: &str, user: String, max_tokens: u32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens,
        };

        let reply: ChatResponse = self.post("chat/completions", &request).await?;
        if let Some(usage) = &reply.usage {
            tracing::debug!("{} used {} tokens", self.model, usage.total_tokens);
        }
        let choice = reply
            .choices
            .into_iter()
            .next()
            .context("chat reply has no choices")?;
        Ok(choice.message.content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl AIProvider for OpenAIProvider {
    async fn summarize(&self, unit_name: &str, source_text: &str) -> Result<Option<String>> {
        let summary = self
            .chat(
                prompt::SUMMARY_SYSTEM_PROMPT,
                prompt::summary_prompt(unit_name, source_text),
                150,
            )
            .await?;
        Ok((!prompt::is_skip(&summary)).then_some(summary))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };
        let reply: EmbeddingResponse = self.post("embeddings", &request).await?;
        reply
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("embedding reply has no data")
    }

    async fn explain_conflict(&self, recent: UnitView<'_>, legacy: UnitView<'_>) -> Result<String> {
        self.chat(
            prompt::CONFLICT_SYSTEM_PROMPT,
            prompt::conflict_prompt(recent, legacy),
            200,
        )
        .await
    }

    async fn assess_impact(
        &self,
        changed: UnitView<'_>,
        caller: UnitView<'_>,
        caller_is_legacy: bool,
    ) -> Result<Option<String>> {
        let raw = self
            .chat(
                prompt::IMPACT_SYSTEM_PROMPT,
                prompt::impact_prompt(changed, caller, caller_is_legacy),
                200,
            )
            .await?;
        Ok(prompt::usable_assessment(&raw))
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}
