use chrono::{DateTime, Utc};
use poem_openapi::{ApiResponse, Enum, Object, Union, payload::Json};

use crate::{
    domain::models::{EpubLocator, ProgressPayload, ProgressRecord, SyncResult, SyncStatus},
    storage::StoreError,
    sync::SyncError,
};

#[derive(Debug, Clone, Object)]
pub struct ErrorDto {
    /// Human-readable error message
    pub message: String,
}

impl From<String> for ErrorDto {
    fn from(message: String) -> Self {
        ErrorDto { message }
    }
}

// ===== Progress payloads =====

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct EpubLocatorDto {
    pub href: String,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub cfi: Option<String>,
    pub progression: Option<f64>,
    pub position: Option<i64>,
    pub total_progression: Option<f64>,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct PagedProgressDto {
    /// 1-based page number
    pub page: u32,
    #[oai(default)]
    pub elapsed_seconds: u64,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct EpubProgressDto {
    pub locator: EpubLocatorDto,
    /// 0 - 100
    pub percentage: f64,
    #[oai(default)]
    pub elapsed_seconds: u64,
}

#[derive(Debug, Clone, Union)]
#[oai(discriminator_name = "kind")]
pub enum ProgressPayloadDto {
    #[oai(mapping = "paged")]
    Paged(PagedProgressDto),
    #[oai(mapping = "epub")]
    Epub(EpubProgressDto),
}

impl From<EpubLocatorDto> for EpubLocator {
    fn from(dto: EpubLocatorDto) -> Self {
        EpubLocator {
            href: dto.href,
            media_type: dto.media_type,
            title: dto.title,
            cfi: dto.cfi,
            progression: dto.progression,
            position: dto.position,
            total_progression: dto.total_progression,
        }
    }
}

impl From<&EpubLocator> for EpubLocatorDto {
    fn from(locator: &EpubLocator) -> Self {
        EpubLocatorDto {
            href: locator.href.clone(),
            media_type: locator.media_type.clone(),
            title: locator.title.clone(),
            cfi: locator.cfi.clone(),
            progression: locator.progression,
            position: locator.position,
            total_progression: locator.total_progression,
        }
    }
}

impl From<ProgressPayloadDto> for ProgressPayload {
    fn from(dto: ProgressPayloadDto) -> Self {
        match dto {
            ProgressPayloadDto::Paged(p) => ProgressPayload::Paged {
                page: p.page,
                elapsed_seconds: p.elapsed_seconds,
            },
            ProgressPayloadDto::Epub(e) => ProgressPayload::Epub {
                locator: e.locator.into(),
                percentage: e.percentage,
                elapsed_seconds: e.elapsed_seconds,
            },
        }
    }
}

impl From<&ProgressPayload> for ProgressPayloadDto {
    fn from(payload: &ProgressPayload) -> Self {
        match payload {
            ProgressPayload::Paged {
                page,
                elapsed_seconds,
            } => ProgressPayloadDto::Paged(PagedProgressDto {
                page: *page,
                elapsed_seconds: *elapsed_seconds,
            }),
            ProgressPayload::Epub {
                locator,
                percentage,
                elapsed_seconds,
            } => ProgressPayloadDto::Epub(EpubProgressDto {
                locator: locator.into(),
                percentage: *percentage,
                elapsed_seconds: *elapsed_seconds,
            }),
        }
    }
}

// ===== Records and sync results =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[oai(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatusDto {
    Unsynced,
    Syncing,
    Synced,
    Error,
}

impl From<SyncStatus> for SyncStatusDto {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Unsynced => SyncStatusDto::Unsynced,
            SyncStatus::Syncing => SyncStatusDto::Syncing,
            SyncStatus::Synced => SyncStatusDto::Synced,
            SyncStatus::Error => SyncStatusDto::Error,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ProgressRecordDto {
    pub server_id: String,
    pub book_id: String,
    pub sync_status: SyncStatusDto,
    pub payload: ProgressPayloadDto,
    pub updated_at: DateTime<Utc>,
}

impl From<&ProgressRecord> for ProgressRecordDto {
    fn from(record: &ProgressRecord) -> Self {
        ProgressRecordDto {
            server_id: record.server_id.clone(),
            book_id: record.book_id.clone(),
            sync_status: record.sync_status.into(),
            payload: (&record.payload).into(),
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct ServerSyncResultDto {
    pub server_id: String,
    pub synced_count: u32,
    pub failure_count: u32,
    /// Set when the pass for this server could not run
    pub error: Option<String>,
}

impl ServerSyncResultDto {
    pub fn from_outcome(server_id: String, outcome: &Result<SyncResult, SyncError>) -> Self {
        match outcome {
            Ok(result) => ServerSyncResultDto {
                server_id,
                synced_count: result.synced_count,
                failure_count: result.failure_count,
                error: None,
            },
            Err(e) => ServerSyncResultDto {
                server_id,
                synced_count: 0,
                failure_count: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

// ===== Responses =====

#[derive(ApiResponse)]
pub enum ProgressWriteResponseDto {
    /// Stored record
    #[oai(status = 200)]
    Ok(Json<ProgressRecordDto>),

    /// Payload failed validation
    #[oai(status = 400)]
    BadRequest(Json<ErrorDto>),

    /// Payload shape differs from the stored record
    #[oai(status = 409)]
    Conflict(Json<ErrorDto>),

    /// Local store failure
    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

impl From<StoreError> for ProgressWriteResponseDto {
    fn from(e: StoreError) -> Self {
        let body = Json(ErrorDto::from(e.to_string()));
        match e {
            StoreError::InvalidPayload(_) => ProgressWriteResponseDto::BadRequest(body),
            StoreError::ShapeMismatch { .. } => ProgressWriteResponseDto::Conflict(body),
            StoreError::Database(_) | StoreError::Corrupt(_) => {
                ProgressWriteResponseDto::InternalError(body)
            }
        }
    }
}

#[derive(ApiResponse)]
pub enum ProgressListResponseDto {
    /// Records of the server ordered by book id
    #[oai(status = 200)]
    Ok(Json<Vec<ProgressRecordDto>>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum ProgressGetResponseDto {
    #[oai(status = 200)]
    Ok(Json<ProgressRecordDto>),

    /// No progress recorded for this book
    #[oai(status = 404)]
    NotFound(Json<ErrorDto>),

    #[oai(status = 500)]
    InternalError(Json<ErrorDto>),
}

#[derive(ApiResponse)]
pub enum SyncRunResponseDto {
    /// One entry per configured server
    #[oai(status = 200)]
    Ok(Json<Vec<ServerSyncResultDto>>),
}
