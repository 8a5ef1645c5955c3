use poem_openapi::payload::Json;

use crate::{
    api::models::{ServerSyncResultDto, SyncRunResponseDto},
    config::ServerConnection,
    sync::Scheduler,
};

pub struct SyncService<'a> {
    pub scheduler: &'a Scheduler,
    pub servers: &'a [ServerConnection],
}

impl<'a> SyncService<'a> {
    pub fn new(scheduler: &'a Scheduler, servers: &'a [ServerConnection]) -> Self {
        Self { scheduler, servers }
    }

    /// Manual "sync now" across every configured server.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn sync_now(&self) -> SyncRunResponseDto {
        let outcomes = self.scheduler.sync_servers(self.servers).await;
        tracing::info!(servers = outcomes.len(), "manual sync finished");
        let dtos = outcomes
            .iter()
            .map(|(server_id, outcome)| ServerSyncResultDto::from_outcome(server_id.clone(), outcome))
            .collect();
        SyncRunResponseDto::Ok(Json(dtos))
    }
}
