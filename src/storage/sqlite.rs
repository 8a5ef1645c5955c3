use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use super::{ProgressStore, StoreError, StoreResult, SyncClaim};
use crate::domain::{
    mapping::{map_record, payload_columns},
    models::{ProgressPayload, ProgressRecord, Resolution, SyncStatus},
};
use entities::read_progress::{self, Column, Entity as ReadProgress};

/// Progress store backed by the `read_progress` table.
#[derive(Clone, Debug)]
pub struct SeaOrmProgressStore {
    db: DatabaseConnection,
}

impl SeaOrmProgressStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn pending_values() -> Vec<String> {
        SyncStatus::PENDING.iter().map(|s| s.to_value()).collect()
    }

    async fn find_row(
        &self,
        server_id: &str,
        book_id: &str,
    ) -> StoreResult<Option<read_progress::Model>> {
        Ok(ReadProgress::find_by_id((server_id.to_owned(), book_id.to_owned()))
            .one(&self.db)
            .await?)
    }

    /// Inserts or overwrites the payload of one record with the given status, dropping any claim.
    async fn upsert(
        &self,
        server_id: &str,
        book_id: &str,
        payload: &ProgressPayload,
        status: SyncStatus,
    ) -> StoreResult<ProgressRecord> {
        payload.validate()?;
        let cols = payload_columns(payload)?;
        let row = read_progress::ActiveModel {
            server_id: Set(server_id.to_owned()),
            book_id: Set(book_id.to_owned()),
            kind: Set(cols.kind),
            page: Set(cols.page),
            percentage: Set(cols.percentage),
            locator: Set(cols.locator),
            elapsed_seconds: Set(cols.elapsed_seconds),
            sync_status: Set(status),
            claim_id: Set(None),
            syncing_since: Set(None),
            updated_at: Set(Utc::now()),
        };
        // The kind predicate keeps the shape check and the write in one statement: a row of the
        // other shape is left untouched.
        let written = ReadProgress::insert(row)
            .on_conflict(
                OnConflict::columns([Column::ServerId, Column::BookId])
                    .update_columns([
                        Column::Page,
                        Column::Percentage,
                        Column::Locator,
                        Column::ElapsedSeconds,
                        Column::SyncStatus,
                        Column::ClaimId,
                        Column::SyncingSince,
                        Column::UpdatedAt,
                    ])
                    .action_and_where(Column::Kind.eq(cols.kind.to_value()))
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let stored = self
            .find_row(server_id, book_id)
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotFound(format!("{server_id}/{book_id}")))?;
        if written == 0 || stored.kind != cols.kind {
            return Err(StoreError::ShapeMismatch {
                server_id: server_id.to_owned(),
                book_id: book_id.to_owned(),
                stored: stored.kind,
                attempted: cols.kind,
            });
        }
        Ok(map_record(&stored)?)
    }
}

#[async_trait::async_trait]
impl ProgressStore for SeaOrmProgressStore {
    #[tracing::instrument(level = "debug", skip(self, payload))]
    async fn record_local_progress(
        &self,
        server_id: &str,
        book_id: &str,
        payload: &ProgressPayload,
    ) -> StoreResult<ProgressRecord> {
        self.upsert(server_id, book_id, payload, SyncStatus::Unsynced)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn select_pending(&self, server_id: &str) -> StoreResult<Vec<ProgressRecord>> {
        let rows = ReadProgress::find()
            .filter(Column::ServerId.eq(server_id))
            .filter(Column::SyncStatus.is_in(Self::pending_values()))
            .order_by_asc(Column::BookId)
            .all(&self.db)
            .await?;
        rows.iter()
            .map(|r| map_record(r).map_err(StoreError::from))
            .collect()
    }

    #[tracing::instrument(level = "debug", skip(self, book_ids), fields(requested = book_ids.len()))]
    async fn mark_syncing(&self, server_id: &str, book_ids: &[String]) -> StoreResult<SyncClaim> {
        let claim_id = Uuid::new_v4();
        if book_ids.is_empty() {
            return Ok(SyncClaim {
                id: claim_id,
                records: vec![],
            });
        }

        // Single UPDATE: the status predicate is the compare half of the compare-and-set.
        let updated = ReadProgress::update_many()
            .col_expr(Column::SyncStatus, Expr::value(SyncStatus::Syncing.to_value()))
            .col_expr(Column::ClaimId, Expr::value(claim_id))
            .col_expr(Column::SyncingSince, Expr::value(Utc::now()))
            .filter(Column::ServerId.eq(server_id))
            .filter(Column::BookId.is_in(book_ids.iter().cloned()))
            .filter(Column::SyncStatus.is_in(Self::pending_values()))
            .exec(&self.db)
            .await?;

        let rows = ReadProgress::find()
            .filter(Column::ServerId.eq(server_id))
            .filter(Column::ClaimId.eq(claim_id))
            .filter(Column::SyncStatus.eq(SyncStatus::Syncing.to_value()))
            .order_by_asc(Column::BookId)
            .all(&self.db)
            .await?;
        tracing::debug!(
            %claim_id,
            claimed = updated.rows_affected,
            "marked records syncing"
        );

        let records = rows
            .iter()
            .map(|r| map_record(r).map_err(StoreError::from))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(SyncClaim {
            id: claim_id,
            records,
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn mark_result(
        &self,
        server_id: &str,
        book_id: &str,
        claim_id: Uuid,
        resolution: Resolution,
    ) -> StoreResult<bool> {
        let status = SyncStatus::from(resolution);
        let updated = ReadProgress::update_many()
            .col_expr(Column::SyncStatus, Expr::value(status.to_value()))
            .col_expr(Column::ClaimId, Expr::value(Option::<Uuid>::None))
            .col_expr(
                Column::SyncingSince,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(Column::ServerId.eq(server_id))
            .filter(Column::BookId.eq(book_id))
            .filter(Column::ClaimId.eq(claim_id))
            .filter(Column::SyncStatus.eq(SyncStatus::Syncing.to_value()))
            .exec(&self.db)
            .await?;
        Ok(updated.rows_affected == 1)
    }

    #[tracing::instrument(level = "debug", skip(self, payload))]
    async fn mirror_confirmed(
        &self,
        server_id: &str,
        book_id: &str,
        payload: &ProgressPayload,
    ) -> StoreResult<ProgressRecord> {
        self.upsert(server_id, book_id, payload, SyncStatus::Synced)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn release_stale(&self, server_id: &str, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let updated = ReadProgress::update_many()
            .col_expr(Column::SyncStatus, Expr::value(SyncStatus::Unsynced.to_value()))
            .col_expr(Column::ClaimId, Expr::value(Option::<Uuid>::None))
            .col_expr(
                Column::SyncingSince,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(Column::ServerId.eq(server_id))
            .filter(Column::SyncStatus.eq(SyncStatus::Syncing.to_value()))
            .filter(Column::SyncingSince.lt(cutoff))
            .exec(&self.db)
            .await?;
        if updated.rows_affected > 0 {
            tracing::warn!(
                server_id,
                released = updated.rows_affected,
                "released records abandoned in SYNCING"
            );
        }
        Ok(updated.rows_affected)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, server_id: &str, book_id: &str) -> StoreResult<Option<ProgressRecord>> {
        self.find_row(server_id, book_id)
            .await?
            .map(|r| map_record(&r).map_err(StoreError::from))
            .transpose()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list(&self, server_id: &str) -> StoreResult<Vec<ProgressRecord>> {
        let rows = ReadProgress::find()
            .filter(Column::ServerId.eq(server_id))
            .order_by_asc(Column::BookId)
            .all(&self.db)
            .await?;
        rows.iter()
            .map(|r| map_record(r).map_err(StoreError::from))
            .collect()
    }
}
