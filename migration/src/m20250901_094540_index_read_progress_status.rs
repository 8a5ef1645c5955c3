use crate::m20250901_093012_create_read_progress_table::ReadProgress;
use sea_orm_migration::prelude::*;

const INDEX_NAME: &str = "idx_read_progress_server_status";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name(INDEX_NAME)
                    .table(ReadProgress::Table)
                    .col(ReadProgress::ServerId)
                    .col(ReadProgress::SyncStatus)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(INDEX_NAME)
                    .table(ReadProgress::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
