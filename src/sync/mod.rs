//! Outbound reconciliation, multi-server scheduling and the inbound mirror.

pub mod mirror;
pub mod reconciler;
pub mod scheduler;

use std::time::Duration;

use thiserror::Error;

use crate::{gateway::GatewayBuildError, storage::StoreError};

pub use mirror::{LiveOutcome, LiveSession, ProgressMirror};
pub use reconciler::Reconciler;
pub use scheduler::{Scheduler, ServerOutcomes};

/// How a pass reports records that ended in `ERROR`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureCountMode {
    /// Count every record that ended in `ERROR`.
    #[default]
    Actual,
    /// Always report zero failures, as older clients did.
    Legacy,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub failure_count: FailureCountMode,
    /// Records held `SYNCING` longer than this are handed back to `UNSYNCED` before a pass.
    pub syncing_lease: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("progress store failure: {0}")]
    Store(#[from] StoreError),
    #[error("could not create gateway: {0}")]
    Gateway(#[from] GatewayBuildError),
    #[error("sync pass aborted: {0}")]
    Aborted(String),
}
