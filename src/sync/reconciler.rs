use chrono::Utc;

use super::{FailureCountMode, SyncError, SyncOptions};
use crate::{
    domain::models::{Resolution, SyncResult},
    gateway::ProgressGateway,
    storage::ProgressStore,
};

/// One outbound pass over a single server's pending records.
pub struct Reconciler<'a> {
    store: &'a dyn ProgressStore,
    gateway: &'a dyn ProgressGateway,
    options: &'a SyncOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn ProgressStore,
        gateway: &'a dyn ProgressGateway,
        options: &'a SyncOptions,
    ) -> Self {
        Self {
            store,
            gateway,
            options,
        }
    }

    /// Claims every pending record of `server_id`, pushes them one by one and resolves each.
    ///
    /// Push failures end up as `ERROR` rows and are never returned; only store failures abort
    /// the pass.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn run(&self, server_id: &str) -> Result<SyncResult, SyncError> {
        let cutoff = self
            .options
            .syncing_lease
            .and_then(|lease| chrono::Duration::from_std(lease).ok())
            .and_then(|lease| Utc::now().checked_sub_signed(lease));
        if let Some(cutoff) = cutoff {
            self.store.release_stale(server_id, cutoff).await?;
        }

        let pending = self.store.select_pending(server_id).await?;
        if pending.is_empty() {
            tracing::debug!(server_id, "nothing to sync");
            return Ok(SyncResult::default());
        }

        let book_ids: Vec<String> = pending.into_iter().map(|r| r.book_id).collect();
        let claim = self.store.mark_syncing(server_id, &book_ids).await?;
        if claim.is_empty() {
            tracing::debug!(server_id, "pending records already claimed by another pass");
            return Ok(SyncResult::default());
        }

        let mut synced = 0u32;
        let mut failed = 0u32;
        for record in &claim.records {
            let resolution = match self
                .gateway
                .push_progress(&record.book_id, &record.payload)
                .await
            {
                Ok(()) => Resolution::Synced,
                Err(reason) => {
                    tracing::warn!(
                        server_id,
                        book_id = %record.book_id,
                        error = %reason,
                        "progress push failed"
                    );
                    Resolution::Error
                }
            };

            let applied = self
                .store
                .mark_result(server_id, &record.book_id, claim.id, resolution)
                .await?;
            if !applied {
                tracing::debug!(
                    server_id,
                    book_id = %record.book_id,
                    "record changed while in flight, leaving newer state in place"
                );
            }
            match resolution {
                Resolution::Synced => synced += 1,
                Resolution::Error => failed += 1,
            }
        }

        let failure_count = match self.options.failure_count {
            FailureCountMode::Actual => failed,
            FailureCountMode::Legacy => 0,
        };
        tracing::info!(server_id, synced, failed, "reconciliation pass finished");
        Ok(SyncResult {
            synced_count: synced,
            failure_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::domain::models::SyncStatus;
    use crate::test_support::{StubGateway, memory_store, paged};

    #[tokio::test]
    async fn one_success_one_failure_reports_true_counts() {
        let store = memory_store().await;
        store.record_local_progress("s1", "b1", &paged(5)).await.unwrap();
        store.record_local_progress("s1", "b2", &paged(1)).await.unwrap();
        let gateway = StubGateway::failing_for(["b2"]);
        let options = SyncOptions::default();

        let result = Reconciler::new(&store, &gateway, &options)
            .run("s1")
            .await
            .unwrap();

        assert_eq!(
            result,
            SyncResult {
                synced_count: 1,
                failure_count: 1
            }
        );
        let b1 = store.get("s1", "b1").await.unwrap().unwrap();
        assert_eq!(b1.sync_status, SyncStatus::Synced);
        assert_eq!(b1.payload, paged(5));
        let b2 = store.get("s1", "b2").await.unwrap().unwrap();
        assert_eq!(b2.sync_status, SyncStatus::Error);
        assert_eq!(b2.payload, paged(1));
    }

    #[tokio::test]
    async fn legacy_mode_reports_zero_failures() {
        let store = memory_store().await;
        store.record_local_progress("s1", "b1", &paged(5)).await.unwrap();
        store.record_local_progress("s1", "b2", &paged(1)).await.unwrap();
        let gateway = StubGateway::failing_for(["b2"]);
        let options = SyncOptions {
            failure_count: FailureCountMode::Legacy,
            ..Default::default()
        };

        let result = Reconciler::new(&store, &gateway, &options)
            .run("s1")
            .await
            .unwrap();

        assert_eq!(
            result,
            SyncResult {
                synced_count: 1,
                failure_count: 0
            }
        );
        // the record still ends in ERROR, only the aggregate hides it
        let b2 = store.get("s1", "b2").await.unwrap().unwrap();
        assert_eq!(b2.sync_status, SyncStatus::Error);
    }

    #[tokio::test]
    async fn empty_pass_makes_no_calls() {
        let store = memory_store().await;
        store.mirror_confirmed("s1", "b1", &paged(3)).await.unwrap();
        let gateway = StubGateway::succeeding();
        let options = SyncOptions::default();

        let result = Reconciler::new(&store, &gateway, &options)
            .run("s1")
            .await
            .unwrap();

        assert_eq!(result, SyncResult::default());
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn later_pass_retries_only_failed_records() {
        let store = memory_store().await;
        store.record_local_progress("s1", "r1", &paged(2)).await.unwrap();
        store.record_local_progress("s1", "r2", &paged(3)).await.unwrap();
        let options = SyncOptions::default();

        let flaky = StubGateway::failing_for(["r1"]);
        Reconciler::new(&store, &flaky, &options)
            .run("s1")
            .await
            .unwrap();

        let healthy = StubGateway::succeeding();
        let result = Reconciler::new(&store, &healthy, &options)
            .run("s1")
            .await
            .unwrap();

        assert_eq!(healthy.calls(), vec!["r1".to_string()]);
        assert_eq!(result.synced_count, 1);
        assert_eq!(
            store.get("s1", "r1").await.unwrap().unwrap().sync_status,
            SyncStatus::Synced
        );
    }

    #[tokio::test]
    async fn concurrent_passes_push_each_record_once() {
        let store = memory_store().await;
        for book in ["b1", "b2", "b3"] {
            store.record_local_progress("s1", book, &paged(1)).await.unwrap();
        }
        let gateway = StubGateway::succeeding().with_delay(Duration::from_millis(20));
        let options = SyncOptions::default();
        let first = Reconciler::new(&store, &gateway, &options);
        let second = Reconciler::new(&store, &gateway, &options);

        let (a, b) = tokio::join!(first.run("s1"), second.run("s1"));
        let total = a.unwrap().synced_count + b.unwrap().synced_count;

        assert_eq!(total, 3);
        for book in ["b1", "b2", "b3"] {
            assert_eq!(gateway.calls_for(book), 1, "{book} pushed more than once");
        }
    }

    #[tokio::test]
    async fn abandoned_syncing_records_are_released_by_lease() {
        let store = Arc::new(memory_store().await);
        store.record_local_progress("s1", "b1", &paged(4)).await.unwrap();
        // a pass that claimed the record and never came back
        store.mark_syncing("s1", &["b1".to_string()]).await.unwrap();
        let gateway = StubGateway::succeeding();

        let no_lease = SyncOptions::default();
        let result = Reconciler::new(store.as_ref(), &gateway, &no_lease)
            .run("s1")
            .await
            .unwrap();
        assert_eq!(result, SyncResult::default());

        let zero_lease = SyncOptions {
            syncing_lease: Some(Duration::ZERO),
            ..Default::default()
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = Reconciler::new(store.as_ref(), &gateway, &zero_lease)
            .run("s1")
            .await
            .unwrap();
        assert_eq!(result.synced_count, 1);
        assert_eq!(gateway.calls_for("b1"), 1);
    }
}
