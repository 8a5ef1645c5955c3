// Persistence seam for progress records; the sea-orm implementation lives in `sqlite`

pub mod sqlite;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::mapping::MappingError;
use crate::domain::models::{
    PayloadError, ProgressKind, ProgressPayload, ProgressRecord, Resolution,
};

pub use sqlite::SeaOrmProgressStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("corrupt progress row: {0}")]
    Corrupt(#[from] MappingError),
    #[error("invalid progress payload: {0}")]
    InvalidPayload(#[from] PayloadError),
    #[error(
        "progress for book {book_id} on server {server_id} is {stored:?}, refusing to overwrite with {attempted:?}"
    )]
    ShapeMismatch {
        server_id: String,
        book_id: String,
        stored: ProgressKind,
        attempted: ProgressKind,
    },
}

/// Records a pass moved to `SYNCING`, tagged with the id that owns them.
#[derive(Debug, Clone)]
pub struct SyncClaim {
    pub id: Uuid,
    pub records: Vec<ProgressRecord>,
}

impl SyncClaim {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    /// Local reading session wrote a new position. Resets the record to `UNSYNCED`.
    async fn record_local_progress(
        &self,
        server_id: &str,
        book_id: &str,
        payload: &ProgressPayload,
    ) -> StoreResult<ProgressRecord>;

    /// Records of `server_id` that are neither `SYNCED` nor `SYNCING`, ordered by book id.
    async fn select_pending(&self, server_id: &str) -> StoreResult<Vec<ProgressRecord>>;

    /// Moves the given books of `server_id` to `SYNCING` in one statement. Only records that are
    /// still pending are taken; the claim lists exactly those.
    async fn mark_syncing(&self, server_id: &str, book_ids: &[String]) -> StoreResult<SyncClaim>;

    /// Resolves one claimed record. Returns false when the record is no longer held by `claim_id`
    /// (a newer local edit or a lease release got there first).
    async fn mark_result(
        &self,
        server_id: &str,
        book_id: &str,
        claim_id: Uuid,
        resolution: Resolution,
    ) -> StoreResult<bool>;

    /// Stores a server-confirmed position as `SYNCED`, whatever the previous status was.
    async fn mirror_confirmed(
        &self,
        server_id: &str,
        book_id: &str,
        payload: &ProgressPayload,
    ) -> StoreResult<ProgressRecord>;

    /// Demotes records left `SYNCING` since before `cutoff` back to `UNSYNCED`.
    async fn release_stale(&self, server_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    async fn get(&self, server_id: &str, book_id: &str) -> StoreResult<Option<ProgressRecord>>;

    async fn list(&self, server_id: &str) -> StoreResult<Vec<ProgressRecord>>;
}
