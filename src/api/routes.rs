use std::sync::Arc;

use poem_openapi::{OpenApi, param::Path, payload::Json, payload::PlainText};

use super::models::{
    ProgressGetResponseDto, ProgressListResponseDto, ProgressPayloadDto, ProgressWriteResponseDto,
    SyncRunResponseDto,
};
use super::services::{health::HealthService, progress::ProgressService, sync::SyncService};
use crate::{config::ServerConnection, sync::Scheduler};

pub struct ProgressSyncApi {
    pub scheduler: Arc<Scheduler>,
    pub servers: Arc<Vec<ServerConnection>>,
}

#[OpenApi]
impl ProgressSyncApi {
    #[oai(path = "/status", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn status(&self) -> PlainText<String> {
        tracing::debug!("handling /status");
        HealthService::new(&self.servers).status_text().await
    }

    /// All progress records kept for a server
    #[oai(path = "/v1/servers/:server_id/progress", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, server_id))]
    async fn list_progress(&self, server_id: Path<String>) -> ProgressListResponseDto {
        ProgressService::new(self.scheduler.store().as_ref())
            .list(&server_id.0)
            .await
    }

    #[oai(path = "/v1/servers/:server_id/books/:book_id/progress", method = "get")]
    #[tracing::instrument(level = "debug", skip(self, server_id, book_id))]
    async fn get_progress(
        &self,
        server_id: Path<String>,
        book_id: Path<String>,
    ) -> ProgressGetResponseDto {
        ProgressService::new(self.scheduler.store().as_ref())
            .get(&server_id.0, &book_id.0)
            .await
    }

    /// Local reading progress; queued for the next outbound sync
    #[oai(path = "/v1/servers/:server_id/books/:book_id/progress", method = "put")]
    #[tracing::instrument(level = "debug", skip(self, server_id, book_id, body))]
    async fn record_progress(
        &self,
        server_id: Path<String>,
        book_id: Path<String>,
        body: Json<ProgressPayloadDto>,
    ) -> ProgressWriteResponseDto {
        tracing::debug!(server_id = %server_id.0, book_id = %book_id.0, "handling record_progress");
        ProgressService::new(self.scheduler.store().as_ref())
            .record_local(&server_id.0, &book_id.0, body.0)
            .await
    }

    /// Progress the server already confirmed; stored as synced
    #[oai(
        path = "/v1/servers/:server_id/books/:book_id/progress/confirmed",
        method = "put"
    )]
    #[tracing::instrument(level = "debug", skip(self, server_id, book_id, body))]
    async fn confirm_progress(
        &self,
        server_id: Path<String>,
        book_id: Path<String>,
        body: Json<ProgressPayloadDto>,
    ) -> ProgressWriteResponseDto {
        ProgressService::new(self.scheduler.store().as_ref())
            .mirror_confirmed(&server_id.0, &book_id.0, body.0)
            .await
    }

    /// Sync every configured server now
    #[oai(path = "/v1/sync", method = "post")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn sync_now(&self) -> SyncRunResponseDto {
        SyncService::new(&self.scheduler, &self.servers)
            .sync_now()
            .await
    }
}

#[cfg(test)]
mod tests {
    use poem::{Route, http::StatusCode, test::TestClient};
    use poem_openapi::OpenApiService;
    use serde_json::json;

    use super::*;
    use crate::config::ServerAuth;
    use crate::sync::SyncOptions;
    use crate::test_support::memory_store;

    async fn client(servers: Vec<ServerConnection>) -> TestClient<Route> {
        let scheduler = Scheduler::new(Arc::new(memory_store().await), SyncOptions::default());
        let api = ProgressSyncApi {
            scheduler: Arc::new(scheduler),
            servers: Arc::new(servers),
        };
        let service = OpenApiService::new(api, "Progress Sync API", "test");
        TestClient::new(Route::new().nest("/", service))
    }

    #[tokio::test]
    async fn put_then_get_progress() {
        let cli = client(vec![]).await;

        let resp = cli
            .put("/v1/servers/s1/books/b1/progress")
            .body_json(&json!({ "kind": "paged", "page": 5, "elapsedSeconds": 30 }))
            .send()
            .await;
        resp.assert_status_is_ok();
        let body = resp.json().await;
        body.value().object().get("syncStatus").assert_string("UNSYNCED");

        let resp = cli.get("/v1/servers/s1/books/b1/progress").send().await;
        resp.assert_status_is_ok();
        let body = resp.json().await;
        body.value()
            .object()
            .get("payload")
            .object()
            .get("kind")
            .assert_string("paged");
        body.value()
            .object()
            .get("payload")
            .object()
            .get("page")
            .assert_i64(5);
    }

    #[tokio::test]
    async fn confirmed_progress_is_synced() {
        let cli = client(vec![]).await;

        let resp = cli
            .put("/v1/servers/s1/books/b1/progress/confirmed")
            .body_json(&json!({
                "kind": "epub",
                "locator": { "href": "ch4.xhtml", "progression": 0.5 },
                "percentage": 48.0
            }))
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.json()
            .await
            .value()
            .object()
            .get("syncStatus")
            .assert_string("SYNCED");
    }

    #[tokio::test]
    async fn invalid_and_conflicting_payloads() {
        let cli = client(vec![]).await;

        let resp = cli
            .put("/v1/servers/s1/books/b1/progress")
            .body_json(&json!({ "kind": "paged", "page": 0 }))
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        cli.put("/v1/servers/s1/books/b1/progress")
            .body_json(&json!({ "kind": "paged", "page": 2 }))
            .send()
            .await
            .assert_status_is_ok();
        let resp = cli
            .put("/v1/servers/s1/books/b1/progress")
            .body_json(&json!({
                "kind": "epub",
                "locator": { "href": "ch1.xhtml" },
                "percentage": 10.0
            }))
            .send()
            .await;
        resp.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn missing_progress_is_not_found() {
        let cli = client(vec![]).await;
        cli.get("/v1/servers/s1/books/nope/progress")
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_now_reports_every_server() {
        let cli = client(vec![ServerConnection {
            id: "broken".into(),
            name: None,
            base_url: "ftp://example.org".into(),
            auth: ServerAuth::None,
        }])
        .await;

        let resp = cli.post("/v1/sync").send().await;
        resp.assert_status_is_ok();
        let body = resp.json().await;
        body.value().array().assert_len(1);
        body.value().array().get(0).object().get("serverId").assert_string("broken");
        body.value().array().get(0).object().get("syncedCount").assert_i64(0);
    }

    #[tokio::test]
    async fn status_lists_server_count() {
        let cli = client(vec![]).await;
        let resp = cli.get("/status").send().await;
        resp.assert_status_is_ok();
        resp.assert_text(format!(
            "{} version={} servers=0",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .await;
    }
}
