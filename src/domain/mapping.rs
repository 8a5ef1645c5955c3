// Mapping between stored rows and domain records

use thiserror::Error;

use super::models::{EpubLocator, ProgressKind, ProgressPayload, ProgressRecord};
use entities::read_progress;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{kind:?} row is missing column {column}")]
    MissingColumn {
        kind: ProgressKind,
        column: &'static str,
    },
    #[error("column {column} holds out-of-range value {value}")]
    OutOfRange { column: &'static str, value: i64 },
    #[error("stored locator is not valid JSON: {0}")]
    Locator(#[from] serde_json::Error),
}

/// Payload fields as they are laid out in the `read_progress` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadColumns {
    pub kind: ProgressKind,
    pub page: Option<i32>,
    pub percentage: Option<f64>,
    pub locator: Option<String>,
    pub elapsed_seconds: i64,
}

pub fn payload_columns(payload: &ProgressPayload) -> Result<PayloadColumns, MappingError> {
    let elapsed_seconds =
        i64::try_from(payload.elapsed_seconds()).map_err(|_| MappingError::OutOfRange {
            column: "elapsed_seconds",
            value: i64::MAX,
        })?;
    Ok(match payload {
        ProgressPayload::Paged { page, .. } => PayloadColumns {
            kind: ProgressKind::Paged,
            page: Some(i32::try_from(*page).map_err(|_| MappingError::OutOfRange {
                column: "page",
                value: i64::from(*page),
            })?),
            percentage: None,
            locator: None,
            elapsed_seconds,
        },
        ProgressPayload::Epub {
            locator,
            percentage,
            ..
        } => PayloadColumns {
            kind: ProgressKind::Epub,
            page: None,
            percentage: Some(*percentage),
            locator: Some(serde_json::to_string(locator)?),
            elapsed_seconds,
        },
    })
}

pub fn map_payload(row: &read_progress::Model) -> Result<ProgressPayload, MappingError> {
    let elapsed_seconds =
        u64::try_from(row.elapsed_seconds).map_err(|_| MappingError::OutOfRange {
            column: "elapsed_seconds",
            value: row.elapsed_seconds,
        })?;
    match row.kind {
        ProgressKind::Paged => {
            let page = row.page.ok_or(MappingError::MissingColumn {
                kind: row.kind,
                column: "page",
            })?;
            let page = u32::try_from(page).map_err(|_| MappingError::OutOfRange {
                column: "page",
                value: i64::from(page),
            })?;
            Ok(ProgressPayload::Paged {
                page,
                elapsed_seconds,
            })
        }
        ProgressKind::Epub => {
            let percentage = row.percentage.ok_or(MappingError::MissingColumn {
                kind: row.kind,
                column: "percentage",
            })?;
            let raw = row.locator.as_deref().ok_or(MappingError::MissingColumn {
                kind: row.kind,
                column: "locator",
            })?;
            let locator: EpubLocator = serde_json::from_str(raw)?;
            Ok(ProgressPayload::Epub {
                locator,
                percentage,
                elapsed_seconds,
            })
        }
    }
}

pub fn map_record(row: &read_progress::Model) -> Result<ProgressRecord, MappingError> {
    Ok(ProgressRecord {
        server_id: row.server_id.clone(),
        book_id: row.book_id.clone(),
        payload: map_payload(row)?,
        sync_status: row.sync_status,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SyncStatus;
    use chrono::Utc;

    fn row(kind: ProgressKind) -> read_progress::Model {
        read_progress::Model {
            server_id: "s1".into(),
            book_id: "b1".into(),
            kind,
            page: None,
            percentage: None,
            locator: None,
            elapsed_seconds: 42,
            sync_status: SyncStatus::Unsynced,
            claim_id: None,
            syncing_since: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn paged_row_maps_to_paged_payload() {
        let mut r = row(ProgressKind::Paged);
        r.page = Some(7);
        let record = map_record(&r).unwrap();
        assert_eq!(
            record.payload,
            ProgressPayload::Paged {
                page: 7,
                elapsed_seconds: 42
            }
        );
    }

    #[test]
    fn epub_columns_carry_locator_json() {
        let payload = ProgressPayload::Epub {
            locator: EpubLocator {
                href: "ch1.xhtml".into(),
                media_type: None,
                title: None,
                cfi: Some("/6/4!/4/2".into()),
                progression: None,
                position: None,
                total_progression: None,
            },
            percentage: 12.5,
            elapsed_seconds: 3,
        };
        let cols = payload_columns(&payload).unwrap();
        assert_eq!(cols.kind, ProgressKind::Epub);
        assert_eq!(cols.page, None);

        let mut r = row(ProgressKind::Epub);
        r.percentage = cols.percentage;
        r.locator = cols.locator;
        r.elapsed_seconds = cols.elapsed_seconds;
        assert_eq!(map_payload(&r).unwrap(), payload);
    }

    #[test]
    fn paged_row_without_page_is_corrupt() {
        let err = map_payload(&row(ProgressKind::Paged)).unwrap_err();
        assert!(matches!(
            err,
            MappingError::MissingColumn { column: "page", .. }
        ));
    }

    #[test]
    fn negative_elapsed_is_rejected() {
        let mut r = row(ProgressKind::Paged);
        r.page = Some(1);
        r.elapsed_seconds = -5;
        assert!(matches!(
            map_payload(&r),
            Err(MappingError::OutOfRange { value: -5, .. })
        ));
    }
}
