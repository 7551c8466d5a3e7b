//! Project configuration loaded from `lumis.toml`, `.env` and `LUMIS_*` variables

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache;
use crate::error::ConfigError;

/// Config file looked up in the repository root.
pub const CONFIG_FILE: &str = "lumis.toml";

/// Top-level configuration.
///
/// Resolution order, highest priority first:
/// 1. `LUMIS_AI_PROVIDER`, `LUMIS_AI_BASE_URL`, `LUMIS_AI_MODEL`
///    (a `.env` in the root is loaded first)
/// 2. `lumis.toml` in the root
/// 3. compiled defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LumisConfig {
    pub risk: RiskConfig,
    pub ai: AiConfig,
    pub scan: ScanConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Units untouched for longer than this are legacy.
    pub legacy_threshold_days: i64,
    /// Units touched more recently than this are recent.
    pub recent_threshold_days: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            legacy_threshold_days: 180,
            recent_threshold_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// `"local"` or `"openai"` (any OpenAI-compatible endpoint).
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Estimated-token cap per run. `None` is unlimited.
    pub token_budget: Option<usize>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            token_budget: None,
        }
    }
}

impl AiConfig {
    /// Resolve the API key from the configured variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
    /// Binary and asset extensions, without the dot.
    pub ignore_extensions: Vec<String>,
    /// Additional glob patterns, relative to the root.
    pub exclude_globs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            skip_dirs: owned(&[
                ".git",
                "node_modules",
                "__pycache__",
                "venv",
                ".venv",
                "dist",
                "build",
                "target",
                cache::CACHE_DIR,
            ]),
            ignore_extensions: owned(&[
                "png", "jpg", "jpeg", "gif", "exe", "dll", "pyc", "o", "obj", "so", "a",
            ]),
            exclude_globs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path. Relative paths are resolved against the root.
    pub path: Option<PathBuf>,
}

impl LumisConfig {
    /// Load the configuration for a repository root.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let env_path = root.join(".env");
        if let Err(e) = dotenvy::from_path(&env_path) {
            if !e.not_found() {
                tracing::warn!("Ignoring {}: {}", env_path.display(), e);
            }
        }

        let path = root.join(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("LUMIS_AI_PROVIDER") {
            self.ai.provider = provider;
        }
        if let Ok(base_url) = std::env::var("LUMIS_AI_BASE_URL") {
            self.ai.base_url = base_url;
        }
        if let Ok(model) = std::env::var("LUMIS_AI_MODEL") {
            self.ai.model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.risk.recent_threshold_days < 0 {
            return Err(ConfigError::Invalid(
                "risk.recent_threshold_days must not be negative".to_string(),
            ));
        }
        if self.risk.recent_threshold_days >= self.risk.legacy_threshold_days {
            return Err(ConfigError::Invalid(format!(
                "risk.recent_threshold_days ({}) must be below risk.legacy_threshold_days ({})",
                self.risk.recent_threshold_days, self.risk.legacy_threshold_days
            )));
        }
        if self.ai.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ai.timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path for this root.
    pub fn store_path(&self, root: &Path) -> PathBuf {
        match &self.store.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => cache::default_db_path(root),
        }
    }
}
