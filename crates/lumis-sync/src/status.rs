//! Run status lifecycle, kept outside the synchronizer
//!
//! A status is created when a run begins, moved through stages while it
//! runs, and finishes as `Done` or `Failed`. Reading a finished status with
//! `take` hands it to the reader and resets the project to `NotStarted`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NotStarted,
    InProgress,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Scanning,
    Processing,
    SweepingOrphans,
    AnalyzingRisk,
    Finalizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scanning => "scanning",
            Stage::Processing => "processing",
            Stage::SweepingOrphans => "sweeping orphans",
            Stage::Finalizing => "finalizing",
            Stage::AnalyzingRisk => "analyzing risk",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub stage: Option<Stage>,
    /// Human-readable trailing message.
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl RunStatus {
    pub fn not_started() -> Self {
        Self::with(RunState::NotStarted, None, "")
    }

    fn with(state: RunState, stage: Option<Stage>, message: &str) -> Self {
        RunStatus {
            state,
            stage,
            message: message.to_string(),
            updated_at: Utc::now(),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.state, self.stage) {
            (RunState::NotStarted, _) => write!(f, "not started"),
            (RunState::InProgress, Some(stage)) => write!(f, "in progress ({}): {}", stage, self.message),
            (RunState::InProgress, None) => write!(f, "in progress: {}", self.message),
            (RunState::Done, _) => write!(f, "done: {}", self.message),
            (RunState::Failed, _) => write!(f, "failed: {}", self.message),
        }
    }
}

/// Where run statuses live. Writes never fail the run; implementations log
/// and carry on.
pub trait StatusStore: Send + Sync {
    fn begin(&self, project_id: &str);

    fn advance(&self, project_id: &str, stage: Stage, message: &str);

    fn complete(&self, project_id: &str, message: &str);

    fn fail(&self, project_id: &str, message: &str);

    /// Current status without changing it.
    fn peek(&self, project_id: &str) -> RunStatus;

    /// Current status; a terminal status is removed as it is read.
    fn take(&self, project_id: &str) -> RunStatus;
}

/// Process-local status store.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    runs: DashMap<String, RunStatus>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, project_id: &str, status: RunStatus) {
        self.runs.insert(project_id.to_string(), status);
    }
}

impl StatusStore for MemoryStatusStore {
    fn begin(&self, project_id: &str) {
        self.set(project_id, RunStatus::with(RunState::InProgress, None, "starting"));
    }

    fn advance(&self, project_id: &str, stage: Stage, message: &str) {
        self.set(project_id, RunStatus::with(RunState::InProgress, Some(stage), message));
    }

    fn complete(&self, project_id: &str, message: &str) {
        self.set(project_id, RunStatus::with(RunState::Done, None, message));
    }

    fn fail(&self, project_id: &str, message: &str) {
        self.set(project_id, RunStatus::with(RunState::Failed, None, message));
    }

    fn peek(&self, project_id: &str) -> RunStatus {
        self.runs
            .get(project_id)
            .map(|r| r.value().clone())
            .unwrap_or_else(RunStatus::not_started)
    }

    fn take(&self, project_id: &str) -> RunStatus {
        match self
            .runs
            .remove_if(project_id, |_, status| status.state.is_terminal())
        {
            Some((_, status)) => status,
            None => self.peek(project_id),
        }
    }
}

/// Status store persisted as one JSON document, so a later process can read
/// the outcome of a run.
#[derive(Debug)]
pub struct JsonStatusStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStatusStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> BTreeMap<String, RunStatus> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Cannot read run status {}: {}", self.path.display(), e);
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable run status {}: {}", self.path.display(), e);
            BTreeMap::new()
        })
    }

    fn save(&self, runs: &BTreeMap<String, RunStatus>) {
        let result = serde_json::to_string_pretty(runs)
            .map_err(std::io::Error::other)
            .and_then(|json| {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, json)
            });
        if let Err(e) = result {
            tracing::warn!("Cannot write run status {}: {}", self.path.display(), e);
        }
    }

    fn update<T>(&self, edit: impl FnOnce(&mut BTreeMap<String, RunStatus>) -> T) -> T {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut runs = self.load();
        let out = edit(&mut runs);
        self.save(&runs);
        out
    }

    fn set(&self, project_id: &str, status: RunStatus) {
        self.update(|runs| {
            runs.insert(project_id.to_string(), status);
        });
    }
}

impl StatusStore for JsonStatusStore {
    fn begin(&self, project_id: &str) {
        self.set(project_id, RunStatus::with(RunState::InProgress, None, "starting"));
    }

    fn advance(&self, project_id: &str, stage: Stage, message: &str) {
        self.set(project_id, RunStatus::with(RunState::InProgress, Some(stage), message));
    }

    fn complete(&self, project_id: &str, message: &str) {
        self.set(project_id, RunStatus::with(RunState::Done, None, message));
    }

    fn fail(&self, project_id: &str, message: &str) {
        self.set(project_id, RunStatus::with(RunState::Failed, None, message));
    }

    fn peek(&self, project_id: &str) -> RunStatus {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.load()
            .remove(project_id)
            .unwrap_or_else(RunStatus::not_started)
    }

    fn take(&self, project_id: &str) -> RunStatus {
        self.update(|runs| {
            let terminal = runs
                .get(project_id)
                .is_some_and(|status| status.state.is_terminal());
            let status = if terminal {
                runs.remove(project_id)
            } else {
                runs.get(project_id).cloned()
            };
            status.unwrap_or_else(RunStatus::not_started)
        })
    }
}
