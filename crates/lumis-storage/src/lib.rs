//! Lumis Storage: persistent graph store backed by SQLite

pub mod schema;
pub mod sqlite;

#[cfg(test)]
pub mod tests;

pub use sqlite::{STALE_LOCK_SECS, SqliteStore};
