use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReadProgress::Table)
                    .if_not_exists()
                    .col(string(ReadProgress::ServerId))
                    .col(string(ReadProgress::BookId))
                    .col(string(ReadProgress::Kind))
                    .col(integer_null(ReadProgress::Page))
                    .col(double_null(ReadProgress::Percentage))
                    .col(text_null(ReadProgress::Locator))
                    .col(big_integer(ReadProgress::ElapsedSeconds))
                    .col(string(ReadProgress::SyncStatus))
                    .col(uuid_null(ReadProgress::ClaimId))
                    .col(timestamp_with_time_zone_null(ReadProgress::SyncingSince))
                    .col(timestamp_with_time_zone(ReadProgress::UpdatedAt))
                    .primary_key(
                        Index::create()
                            .name("pk_read_progress")
                            .col(ReadProgress::ServerId)
                            .col(ReadProgress::BookId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReadProgress::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum ReadProgress {
    Table,
    ServerId,
    BookId,
    Kind,
    Page,
    Percentage,
    Locator,
    ElapsedSeconds,
    SyncStatus,
    ClaimId,
    SyncingSince,
    UpdatedAt,
}
