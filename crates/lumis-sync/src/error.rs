//! Run-level errors

use lumis_core::StoreError;

/// A failure that aborts a synchronization run before its completion marker
/// is written.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("source unavailable: {0}")]
    Source(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("a run for project {0} is already in progress")]
    RunInProgress(String),
}

impl SyncError {
    pub fn unavailable(err: &anyhow::Error) -> Self {
        SyncError::Source(format!("{:#}", err))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
