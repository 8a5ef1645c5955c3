// Domain models shared by the store, the gateway and the HTTP surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use entities::read_progress::{ProgressKind, SyncStatus};

/// Readium-style position inside an epub. Carried as-is to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpubLocator {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cfi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progression: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_progression: Option<f64>,
}

/// Reading position for one book. A record keeps the same shape for its whole life.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressPayload {
    Paged {
        page: u32,
        elapsed_seconds: u64,
    },
    Epub {
        locator: EpubLocator,
        /// 0.0 - 100.0
        percentage: f64,
        elapsed_seconds: u64,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("page must be at least 1, got {0}")]
    PageOutOfRange(u32),
    #[error("percentage must be within 0..=100, got {0}")]
    PercentageOutOfRange(f64),
    #[error("epub locator href is empty")]
    EmptyHref,
}

impl ProgressPayload {
    pub fn kind(&self) -> ProgressKind {
        match self {
            ProgressPayload::Paged { .. } => ProgressKind::Paged,
            ProgressPayload::Epub { .. } => ProgressKind::Epub,
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        match self {
            ProgressPayload::Paged {
                elapsed_seconds, ..
            }
            | ProgressPayload::Epub {
                elapsed_seconds, ..
            } => *elapsed_seconds,
        }
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        match self {
            ProgressPayload::Paged { page, .. } if *page < 1 => {
                Err(PayloadError::PageOutOfRange(*page))
            }
            ProgressPayload::Epub { percentage, .. }
                if !percentage.is_finite() || !(0.0..=100.0).contains(percentage) =>
            {
                Err(PayloadError::PercentageOutOfRange(*percentage))
            }
            ProgressPayload::Epub { locator, .. } if locator.href.trim().is_empty() => {
                Err(PayloadError::EmptyHref)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub server_id: String,
    pub book_id: String,
    pub payload: ProgressPayload,
    pub sync_status: SyncStatus,
    pub updated_at: DateTime<Utc>,
}

/// Terminal outcome of one push within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Synced,
    Error,
}

impl From<Resolution> for SyncStatus {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Synced => SyncStatus::Synced,
            Resolution::Error => SyncStatus::Error,
        }
    }
}

/// Per-server outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub synced_count: u32,
    pub failure_count: u32,
}
