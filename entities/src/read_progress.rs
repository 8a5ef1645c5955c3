//! One reading-progress row per (server, book).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "read_progress")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub server_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub book_id: String,
    pub kind: ProgressKind,
    pub page: Option<i32>,
    #[sea_orm(column_type = "Double", nullable)]
    pub percentage: Option<f64>,
    /// Serialized epub locator (JSON)
    #[sea_orm(column_type = "Text", nullable)]
    pub locator: Option<String>,
    pub elapsed_seconds: i64,
    pub sync_status: SyncStatus,
    /// Pass currently holding the row in `SYNCING`
    pub claim_id: Option<Uuid>,
    pub syncing_since: Option<DateTimeUtc>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[sea_orm(string_value = "UNSYNCED")]
    Unsynced,
    #[sea_orm(string_value = "SYNCING")]
    Syncing,
    #[sea_orm(string_value = "SYNCED")]
    Synced,
    #[sea_orm(string_value = "ERROR")]
    Error,
}

impl SyncStatus {
    /// Statuses picked up by an outbound pass.
    pub const PENDING: [SyncStatus; 2] = [SyncStatus::Unsynced, SyncStatus::Error];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    #[sea_orm(string_value = "paged")]
    Paged,
    #[sea_orm(string_value = "epub")]
    Epub,
}
