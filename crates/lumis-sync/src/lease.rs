//! Per-project run exclusivity
//!
//! The lock lives in the graph store, so a sync in one process and a risk
//! pass in another cannot interleave on the same project.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lumis_core::GraphStore;

use crate::error::{SyncError, SyncResult};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Held run lock for one project; released on drop.
pub struct ProjectLock {
    store: Arc<dyn GraphStore>,
    project_id: String,
    owner: String,
}

impl ProjectLock {
    /// Take the lock, or `None` when another run holds it.
    pub fn try_acquire(store: Arc<dyn GraphStore>, project_id: &str) -> SyncResult<Option<Self>> {
        let owner = format!(
            "pid-{}-{}",
            std::process::id(),
            NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
        );
        if !store.try_lock(project_id, &owner)? {
            return Ok(None);
        }
        tracing::debug!("Run lock for {} taken by {}", project_id, owner);
        Ok(Some(Self {
            store,
            project_id: project_id.to_string(),
            owner,
        }))
    }

    /// Like [`ProjectLock::try_acquire`], with a held lock reported as
    /// [`SyncError::RunInProgress`].
    pub fn acquire(store: Arc<dyn GraphStore>, project_id: &str) -> SyncResult<Self> {
        Self::try_acquire(store, project_id)?
            .ok_or_else(|| SyncError::RunInProgress(project_id.to_string()))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Debug for ProjectLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectLock")
            .field("project_id", &self.project_id)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = self.store.unlock(&self.project_id, &self.owner) {
            tracing::warn!("Failed to release run lock for {}: {}", self.project_id, e);
        }
    }
}
