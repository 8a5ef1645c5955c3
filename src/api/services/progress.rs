use poem_openapi::payload::Json;

use crate::{
    api::models::{
        ErrorDto, ProgressGetResponseDto, ProgressListResponseDto, ProgressPayloadDto,
        ProgressRecordDto, ProgressWriteResponseDto,
    },
    domain::models::ProgressPayload,
    storage::ProgressStore,
    sync::ProgressMirror,
};

pub struct ProgressService<'a> {
    pub store: &'a dyn ProgressStore,
}

impl<'a> ProgressService<'a> {
    pub fn new(store: &'a dyn ProgressStore) -> Self {
        Self { store }
    }

    /// Page turn or location change from the local reader.
    #[tracing::instrument(level = "debug", skip(self, payload))]
    pub async fn record_local(
        &self,
        server_id: &str,
        book_id: &str,
        payload: ProgressPayloadDto,
    ) -> ProgressWriteResponseDto {
        let payload = ProgressPayload::from(payload);
        match self
            .store
            .record_local_progress(server_id, book_id, &payload)
            .await
        {
            Ok(record) => ProgressWriteResponseDto::Ok(Json(ProgressRecordDto::from(&record))),
            Err(e) => {
                tracing::warn!(error = %e, server_id, book_id, "failed to record local progress");
                e.into()
            }
        }
    }

    /// Value the live session already pushed successfully.
    #[tracing::instrument(level = "debug", skip(self, payload))]
    pub async fn mirror_confirmed(
        &self,
        server_id: &str,
        book_id: &str,
        payload: ProgressPayloadDto,
    ) -> ProgressWriteResponseDto {
        let payload = ProgressPayload::from(payload);
        match ProgressMirror::new(self.store)
            .on_confirmed_progress(server_id, book_id, &payload)
            .await
        {
            Ok(record) => ProgressWriteResponseDto::Ok(Json(ProgressRecordDto::from(&record))),
            Err(e) => {
                tracing::warn!(error = %e, server_id, book_id, "failed to mirror confirmed progress");
                e.into()
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn list(&self, server_id: &str) -> ProgressListResponseDto {
        match self.store.list(server_id).await {
            Ok(records) => {
                ProgressListResponseDto::Ok(Json(records.iter().map(ProgressRecordDto::from).collect()))
            }
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), server_id, "failed to list progress");
                ProgressListResponseDto::InternalError(Json(ErrorDto::from(e.to_string())))
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get(&self, server_id: &str, book_id: &str) -> ProgressGetResponseDto {
        match self.store.get(server_id, book_id).await {
            Ok(Some(record)) => ProgressGetResponseDto::Ok(Json(ProgressRecordDto::from(&record))),
            Ok(None) => ProgressGetResponseDto::NotFound(Json(ErrorDto {
                message: format!("no progress for book {} on server {}", book_id, server_id),
            })),
            Err(e) => {
                tracing::error!(error = %format!("{:?}", e), server_id, book_id, "failed to read progress");
                ProgressGetResponseDto::InternalError(Json(ErrorDto::from(e.to_string())))
            }
        }
    }
}
