//! Lumis Sync: differential synchronization and risk propagation
//!
//! The synchronizer keeps a project's stored unit graph in step with its
//! source files; the risk engine then scores the whole graph.

pub mod error;
pub mod lease;
pub mod risk;
pub mod session;
pub mod status;
pub mod synchronizer;


pub use error::{SyncError, SyncResult};
pub use lease::ProjectLock;
pub use risk::{AgeClass, Conflict, RiskAssessment, RiskEngine, RiskReport, classify, propagate};
pub use session::ScanSession;
pub use status::{JsonStatusStore, MemoryStatusStore, RunState, RunStatus, Stage, StatusStore};
pub use synchronizer::{SyncReport, SyncScope, Synchronizer};
