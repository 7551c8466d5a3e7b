//! Per-repository state directory

use std::path::{Path, PathBuf};

/// State directory: .lumis/
pub const CACHE_DIR: &str = ".lumis";

/// Default database file inside the state directory
pub const GRAPH_DB: &str = "graph.db";

/// Get state directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

pub fn default_db_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(GRAPH_DB)
}

/// Ensure state directory exists
pub fn ensure_cache_dir(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if !cache.exists() {
        std::fs::create_dir_all(&cache)?;
        tracing::debug!("Created state directory: {}", cache.display());
    }
    Ok(())
}

/// Remove the state directory and everything in it
pub fn clear_cache(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
    }
    Ok(())
}
