//! Lumis Core: unit graph model, fingerprints, store contract and configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod language;
pub mod model;
pub mod store;


#[cfg(test)]
pub mod test_utils;

pub use cache::{CACHE_DIR, GRAPH_DB, cache_dir, clear_cache, default_db_path, ensure_cache_dir};
pub use config::{AiConfig, CONFIG_FILE, LumisConfig, RiskConfig, ScanConfig, StoreConfig};
pub use error::{ConfigError, StoreError, StoreResult};
pub use fingerprint::Fingerprint;
pub use graph::{CallGraph, LexicalResolver};
pub use language::Language;
pub use model::{CallEdge, CodeUnit, RiskAlert, RiskType, Severity, UnitKey};
pub use store::{GraphStore, MemoryStore};
