//! SQLite schema for the unit graph

use rusqlite::Connection;

/// Bumped whenever a statement below changes shape.
pub const SCHEMA_VERSION: i32 = 2;

pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS code_units (
        project_id TEXT NOT NULL,
        file_path TEXT NOT NULL,
        unit_name TEXT NOT NULL,
        source_text TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        summary TEXT,
        embedding TEXT,
        last_modified_at TEXT,
        author TEXT,
        risk_score INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (project_id, file_path, unit_name)
    );",
    "CREATE TABLE IF NOT EXISTS call_edges (
        project_id TEXT NOT NULL,
        file_path TEXT NOT NULL,
        unit_name TEXT NOT NULL,
        target_name TEXT NOT NULL,
        PRIMARY KEY (project_id, file_path, unit_name, target_name),
        FOREIGN KEY (project_id, file_path, unit_name)
            REFERENCES code_units(project_id, file_path, unit_name) ON DELETE CASCADE
    );",
    "CREATE TABLE IF NOT EXISTS risk_alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id TEXT NOT NULL,
        risk_type TEXT NOT NULL,
        severity TEXT NOT NULL,
        description TEXT NOT NULL,
        source_unit TEXT NOT NULL,
        target_unit TEXT NOT NULL,
        created_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS project_meta (
        project_id TEXT PRIMARY KEY,
        last_revision TEXT
    );",
    "CREATE TABLE IF NOT EXISTS project_locks (
        project_id TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        acquired_at INTEGER NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON call_edges(project_id, target_name);",
    "CREATE INDEX IF NOT EXISTS idx_alerts_project ON risk_alerts(project_id, risk_type);",
];

/// Create missing tables and stamp the schema version.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    for statement in SCHEMA_STATEMENTS {
        conn.execute_batch(statement)?;
    }
    if version < SCHEMA_VERSION {
        tracing::debug!("Schema upgraded from v{} to v{}", version, SCHEMA_VERSION);
        conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
    }
    Ok(())
}
