//! SQLite-backed graph store
//!
//! Every operation opens its own connection with foreign keys enabled, so a
//! store handle is cheap to share between tasks. Edge replacement and file
//! deletion run inside a transaction.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lumis_core::{
    CallEdge, CodeUnit, Fingerprint, GraphStore, RiskAlert, RiskType, Severity, StoreError,
    StoreResult, UnitKey,
};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::schema;

/// Converts driver errors into store errors.
trait SqlResultExt<T> {
    fn store(self) -> StoreResult<T>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn store(self) -> StoreResult<T> {
        self.map_err(StoreError::backend)
    }
}

/// A run lock older than this is treated as abandoned by a crashed process.
pub const STALE_LOCK_SECS: i64 = 6 * 60 * 60;

/// How long a connection waits for another process's write to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const UNIT_COLUMNS: &str = "project_id, file_path, unit_name, source_text, fingerprint, \
summary, embedding, last_modified_at, author, risk_score";

/// Raw column values of one `code_units` row.
struct UnitRow {
    project_id: String,
    file_path: String,
    unit_name: String,
    source_text: String,
    fingerprint: String,
    summary: Option<String>,
    embedding: Option<String>,
    last_modified_at: Option<String>,
    author: Option<String>,
    risk_score: i64,
}

impl UnitRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UnitRow {
            project_id: row.get(0)?,
            file_path: row.get(1)?,
            unit_name: row.get(2)?,
            source_text: row.get(3)?,
            fingerprint: row.get(4)?,
            summary: row.get(5)?,
            embedding: row.get(6)?,
            last_modified_at: row.get(7)?,
            author: row.get(8)?,
            risk_score: row.get(9)?,
        })
    }

    fn into_unit(self) -> StoreResult<CodeUnit> {
        let fingerprint = parse_fingerprint(&self.fingerprint)?;
        let embedding = self
            .embedding
            .as_deref()
            .map(serde_json::from_str::<Vec<f32>>)
            .transpose()?;
        let last_modified_at = self
            .last_modified_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        Ok(CodeUnit {
            key: UnitKey::new(self.project_id, self.file_path, self.unit_name),
            source_text: self.source_text,
            fingerprint,
            summary: self.summary,
            embedding,
            last_modified_at,
            author: self.author,
            risk_score: self.risk_score.clamp(0, 100) as u8,
        })
    }
}

fn parse_fingerprint(value: &str) -> StoreResult<Fingerprint> {
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("{}", e)))
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp {:?}: {}", value, e)))
}

/// SQLite graph store rooted at a single database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`. Parent directories are
    /// created as needed.
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { db_path };
        let conn = store.connect()?;
        schema::init_schema(&conn).store()?;
        tracing::debug!("Opened graph store at {}", store.db_path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.db_path).store()?;
        conn.busy_timeout(BUSY_TIMEOUT).store()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;").store()?;
        Ok(conn)
    }
}

impl GraphStore for SqliteStore {
    fn upsert_unit(&self, unit: &CodeUnit) -> StoreResult<()> {
        let embedding = unit
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.connect()?;
        // ON CONFLICT keeps the row (and its edges) alive; risk_score is untouched.
        conn.execute(
            "INSERT INTO code_units (
                 project_id, file_path, unit_name, source_text, fingerprint,
                 summary, embedding, last_modified_at, author
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(project_id, file_path, unit_name) DO UPDATE SET
                 source_text = excluded.source_text,
                 fingerprint = excluded.fingerprint,
                 summary = excluded.summary,
                 embedding = excluded.embedding,
                 last_modified_at = excluded.last_modified_at,
                 author = excluded.author;",
            params![
                unit.key.project_id,
                unit.key.file_path,
                unit.key.unit_name,
                unit.source_text,
                unit.fingerprint.to_hex(),
                unit.summary,
                embedding,
                unit.last_modified_at.map(|ts| ts.to_rfc3339()),
                unit.author,
            ],
        )
        .store()?;
        Ok(())
    }

    fn get_unit(&self, key: &UnitKey) -> StoreResult<Option<CodeUnit>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM code_units
                     WHERE project_id = ?1 AND file_path = ?2 AND unit_name = ?3;",
                    UNIT_COLUMNS
                ),
                params![key.project_id, key.file_path, key.unit_name],
                UnitRow::read,
            )
            .optional()
            .store()?;
        row.map(UnitRow::into_unit).transpose()
    }

    fn get_unit_fingerprint(&self, key: &UnitKey) -> StoreResult<Option<Fingerprint>> {
        let conn = self.connect()?;
        let hex: Option<String> = conn
            .query_row(
                "SELECT fingerprint FROM code_units
                 WHERE project_id = ?1 AND file_path = ?2 AND unit_name = ?3;",
                params![key.project_id, key.file_path, key.unit_name],
                |row| row.get(0),
            )
            .optional()
            .store()?;
        hex.as_deref().map(parse_fingerprint).transpose()
    }

    fn get_units(&self, project_id: &str) -> StoreResult<Vec<CodeUnit>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM code_units WHERE project_id = ?1
                 ORDER BY file_path, unit_name;",
                UNIT_COLUMNS
            ))
            .store()?;
        let rows = stmt
            .query_map(params![project_id], UnitRow::read)
            .store()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .store()?;
        rows.into_iter().map(UnitRow::into_unit).collect()
    }

    fn get_edges(&self, project_id: &str) -> StoreResult<Vec<CallEdge>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT file_path, unit_name, target_name FROM call_edges
                 WHERE project_id = ?1
                 ORDER BY file_path, unit_name, target_name;",
            )
            .store()?;
        let edges = stmt
            .query_map(params![project_id], |row| {
                Ok(CallEdge::new(
                    UnitKey::new(project_id, row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                    row.get::<_, String>(2)?,
                ))
            })
            .store()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .store()?;
        Ok(edges)
    }

    fn replace_edges(&self, source: &UnitKey, targets: &BTreeSet<String>) -> StoreResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().store()?;
        tx.execute(
            "DELETE FROM call_edges
             WHERE project_id = ?1 AND file_path = ?2 AND unit_name = ?3;",
            params![source.project_id, source.file_path, source.unit_name],
        )
        .store()?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO call_edges (project_id, file_path, unit_name, target_name)
                     VALUES (?1, ?2, ?3, ?4);",
                )
                .store()?;
            for target in targets {
                stmt.execute(params![
                    source.project_id,
                    source.file_path,
                    source.unit_name,
                    target
                ])
                .store()?;
            }
        }
        tx.commit().store()
    }

    fn delete_unit(&self, key: &UnitKey) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM code_units
             WHERE project_id = ?1 AND file_path = ?2 AND unit_name = ?3;",
            params![key.project_id, key.file_path, key.unit_name],
        )
        .store()?;
        Ok(())
    }

    fn delete_units_for_file(&self, project_id: &str, file_path: &str) -> StoreResult<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().store()?;
        tx.execute(
            "DELETE FROM call_edges WHERE project_id = ?1 AND file_path = ?2;",
            params![project_id, file_path],
        )
        .store()?;
        let removed = tx
            .execute(
                "DELETE FROM code_units WHERE project_id = ?1 AND file_path = ?2;",
                params![project_id, file_path],
            )
            .store()?;
        tx.commit().store()?;
        Ok(removed)
    }

    fn file_paths(&self, project_id: &str) -> StoreResult<BTreeSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT file_path FROM code_units WHERE project_id = ?1;")
            .store()?;
        let paths = stmt
            .query_map(params![project_id], |row| row.get::<_, String>(0))
            .store()?
            .collect::<rusqlite::Result<BTreeSet<_>>>()
            .store()?;
        Ok(paths)
    }

    fn unit_names(&self, project_id: &str, file_path: &str) -> StoreResult<BTreeSet<String>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT unit_name FROM code_units WHERE project_id = ?1 AND file_path = ?2;")
            .store()?;
        let names = stmt
            .query_map(params![project_id, file_path], |row| row.get::<_, String>(0))
            .store()?
            .collect::<rusqlite::Result<BTreeSet<_>>>()
            .store()?;
        Ok(names)
    }

    fn set_risk_score(&self, key: &UnitKey, score: u8) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE code_units SET risk_score = ?4
             WHERE project_id = ?1 AND file_path = ?2 AND unit_name = ?3;",
            params![key.project_id, key.file_path, key.unit_name, score.min(100)],
        )
        .store()?;
        Ok(())
    }

    fn replace_alerts(
        &self,
        project_id: &str,
        risk_type: RiskType,
        alerts: &[RiskAlert],
    ) -> StoreResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().store()?;
        tx.execute(
            "DELETE FROM risk_alerts WHERE project_id = ?1 AND risk_type = ?2;",
            params![project_id, risk_type.as_str()],
        )
        .store()?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO risk_alerts (
                         project_id, risk_type, severity, description,
                         source_unit, target_unit, created_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                )
                .store()?;
            for alert in alerts {
                stmt.execute(params![
                    project_id,
                    alert.risk_type.as_str(),
                    alert.severity.as_str(),
                    alert.description,
                    alert.affected_units.0,
                    alert.affected_units.1,
                    alert.created_at.to_rfc3339(),
                ])
                .store()?;
            }
        }
        tx.commit().store()
    }

    fn get_alerts(&self, project_id: &str) -> StoreResult<Vec<RiskAlert>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT risk_type, severity, description, source_unit, target_unit, created_at
                 FROM risk_alerts WHERE project_id = ?1 ORDER BY id;",
            )
            .store()?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .store()?
            .collect::<rusqlite::Result<Vec<_>>>()
            .store()?;

        rows.into_iter()
            .map(
                |(risk_type, severity, description, source, target, created_at)| -> StoreResult<RiskAlert> {
                Ok(RiskAlert {
                    project_id: project_id.to_string(),
                    risk_type: RiskType::parse(&risk_type).ok_or_else(|| {
                        StoreError::Corrupt(format!("unknown risk type {:?}", risk_type))
                    })?,
                    severity: Severity::parse(&severity).ok_or_else(|| {
                        StoreError::Corrupt(format!("unknown severity {:?}", severity))
                    })?,
                    description,
                    affected_units: (source, target),
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    fn last_revision(&self, project_id: &str) -> StoreResult<Option<String>> {
        let conn = self.connect()?;
        let revision: Option<Option<String>> = conn
            .query_row(
                "SELECT last_revision FROM project_meta WHERE project_id = ?1;",
                params![project_id],
                |row| row.get(0),
            )
            .optional()
            .store()?;
        Ok(revision.flatten())
    }

    fn set_last_revision(&self, project_id: &str, revision: &str) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO project_meta (project_id, last_revision) VALUES (?1, ?2)
             ON CONFLICT(project_id) DO UPDATE SET last_revision = excluded.last_revision;",
            params![project_id, revision],
        )
        .store()?;
        Ok(())
    }

    fn try_lock(&self, project_id: &str, owner: &str) -> StoreResult<bool> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .store()?;
        let now = Utc::now().timestamp();
        let stale = tx
            .execute(
                "DELETE FROM project_locks WHERE project_id = ?1 AND acquired_at < ?2;",
                params![project_id, now - STALE_LOCK_SECS],
            )
            .store()?;
        if stale > 0 {
            tracing::warn!("Took over an abandoned run lock for {}", project_id);
        }
        let taken = tx
            .execute(
                "INSERT INTO project_locks (project_id, owner, acquired_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(project_id) DO NOTHING;",
                params![project_id, owner, now],
            )
            .store()?;
        let acquired = taken == 1
            || tx
                .query_row(
                    "SELECT owner FROM project_locks WHERE project_id = ?1;",
                    params![project_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .store()?
                .is_some_and(|held| held == owner);
        tx.commit().store()?;
        Ok(acquired)
    }

    fn unlock(&self, project_id: &str, owner: &str) -> StoreResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM project_locks WHERE project_id = ?1 AND owner = ?2;",
            params![project_id, owner],
        )
        .store()?;
        Ok(())
    }
}
