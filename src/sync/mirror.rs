use crate::{
    domain::models::{ProgressPayload, ProgressRecord},
    gateway::{ProgressGateway, PushError},
    storage::{ProgressStore, StoreResult},
};

/// Writes server-confirmed progress straight into the local store.
pub struct ProgressMirror<'a> {
    store: &'a dyn ProgressStore,
}

impl<'a> ProgressMirror<'a> {
    pub fn new(store: &'a dyn ProgressStore) -> Self {
        Self { store }
    }

    /// Called right after the live session pushed `payload` successfully. The record lands as
    /// `SYNCED`, so no later outbound pass pushes the same value again.
    #[tracing::instrument(level = "debug", skip(self, payload))]
    pub async fn on_confirmed_progress(
        &self,
        server_id: &str,
        book_id: &str,
        payload: &ProgressPayload,
    ) -> StoreResult<ProgressRecord> {
        let record = self
            .store
            .mirror_confirmed(server_id, book_id, payload)
            .await?;
        tracing::debug!(server_id, book_id, "mirrored confirmed progress");
        Ok(record)
    }
}

#[derive(Debug)]
pub enum LiveOutcome {
    /// Server accepted the update and the local record mirrors it.
    Confirmed(ProgressRecord),
    /// Push failed; the value is queued locally for the next outbound pass.
    Deferred {
        record: ProgressRecord,
        reason: PushError,
    },
}

/// Online reading path for one server: push directly, fall back to the offline queue.
pub struct LiveSession<'a> {
    server_id: &'a str,
    store: &'a dyn ProgressStore,
    gateway: &'a dyn ProgressGateway,
}

impl<'a> LiveSession<'a> {
    pub fn new(
        server_id: &'a str,
        store: &'a dyn ProgressStore,
        gateway: &'a dyn ProgressGateway,
    ) -> Self {
        Self {
            server_id,
            store,
            gateway,
        }
    }

    #[tracing::instrument(level = "debug", skip(self, payload), fields(server_id = self.server_id))]
    pub async fn report(&self, book_id: &str, payload: &ProgressPayload) -> StoreResult<LiveOutcome> {
        payload.validate()?;
        match self.gateway.push_progress(book_id, payload).await {
            Ok(()) => {
                let record = ProgressMirror::new(self.store)
                    .on_confirmed_progress(self.server_id, book_id, payload)
                    .await?;
                Ok(LiveOutcome::Confirmed(record))
            }
            Err(reason) => {
                tracing::info!(book_id, error = %reason, "live push failed, queueing for sync");
                let record = self
                    .store
                    .record_local_progress(self.server_id, book_id, payload)
                    .await?;
                Ok(LiveOutcome::Deferred { record, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::domain::models::SyncStatus;
    use crate::storage::StoreError;
    use crate::sync::{Scheduler, SyncOptions};
    use crate::test_support::{StubGateway, epub, memory_store, paged};

    #[tokio::test]
    async fn mirrored_record_is_not_pending() {
        let store = memory_store().await;
        store.record_local_progress("s1", "b1", &paged(3)).await.unwrap();

        let record = ProgressMirror::new(&store)
            .on_confirmed_progress("s1", "b1", &paged(10))
            .await
            .unwrap();

        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert_eq!(record.payload, paged(10));
        assert!(store.select_pending("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mirror_short_circuits_outbound_sync() {
        let store = Arc::new(memory_store().await);
        store.record_local_progress("s1", "b1", &paged(3)).await.unwrap();
        store.record_local_progress("s1", "b2", &paged(6)).await.unwrap();
        ProgressMirror::new(store.as_ref())
            .on_confirmed_progress("s1", "b1", &paged(4))
            .await
            .unwrap();

        let gateway = Arc::new(StubGateway::succeeding());
        let mut gateways: HashMap<String, Arc<dyn ProgressGateway>> = HashMap::new();
        gateways.insert("s1".into(), gateway.clone());
        Scheduler::new(store.clone(), SyncOptions::default())
            .sync_all(gateways)
            .await;

        assert_eq!(gateway.calls(), vec!["b2".to_string()]);
    }

    #[tokio::test]
    async fn live_success_is_mirrored() {
        let store = memory_store().await;
        let gateway = StubGateway::succeeding();

        let outcome = LiveSession::new("s1", &store, &gateway)
            .report("b1", &epub(64.0))
            .await
            .unwrap();

        let record = match outcome {
            LiveOutcome::Confirmed(record) => record,
            other => panic!("expected confirmed outcome, got {other:?}"),
        };
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert_eq!(gateway.calls_for("b1"), 1);
    }

    #[tokio::test]
    async fn live_failure_is_queued_for_outbound() {
        let store = memory_store().await;
        let gateway = StubGateway::failing_all();

        let outcome = LiveSession::new("s1", &store, &gateway)
            .report("b1", &paged(12))
            .await
            .unwrap();

        assert!(matches!(outcome, LiveOutcome::Deferred { .. }));
        let pending = store.select_pending("s1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload, paged(12));
        assert_eq!(pending[0].sync_status, SyncStatus::Unsynced);
    }

    #[tokio::test]
    async fn live_rejects_invalid_payload_before_pushing() {
        let store = memory_store().await;
        let gateway = StubGateway::succeeding();

        let err = LiveSession::new("s1", &store, &gateway)
            .report("b1", &paged(0))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidPayload(_)));
        assert_eq!(gateway.total_calls(), 0);
    }
}
