use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use super::{Reconciler, SyncError, SyncOptions};
use crate::{
    config::ServerConnection,
    domain::models::SyncResult,
    gateway::{GraphqlGateway, ProgressGateway},
    storage::ProgressStore,
};

/// Result of one scheduler run, keyed by server id. Every requested server has an entry.
pub type ServerOutcomes = BTreeMap<String, Result<SyncResult, SyncError>>;

/// Fans reconciliation passes out over every connected server.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn ProgressStore>,
    options: SyncOptions,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Marks a server as having a pass running until dropped.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    server_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.server_id);
    }
}

impl Scheduler {
    pub fn new(store: Arc<dyn ProgressStore>, options: SyncOptions) -> Self {
        Self {
            store,
            options,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    fn begin(&self, server_id: &str) -> Option<InFlightGuard> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(server_id.to_owned()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            server_id: server_id.to_owned(),
        })
    }

    /// Runs one pass per server concurrently. A server whose pass is already running is reported
    /// with an empty result instead of being synced twice.
    #[tracing::instrument(level = "debug", skip_all, fields(servers = gateways.len()))]
    pub async fn sync_all(
        &self,
        gateways: HashMap<String, Arc<dyn ProgressGateway>>,
    ) -> ServerOutcomes {
        let mut outcomes = ServerOutcomes::new();
        let mut passes = Vec::with_capacity(gateways.len());

        for (server_id, gateway) in gateways {
            let Some(guard) = self.begin(&server_id) else {
                tracing::debug!(%server_id, "pass already running, skipping");
                outcomes.insert(server_id, Ok(SyncResult::default()));
                continue;
            };
            passes.push(self.spawn_pass(guard, server_id, gateway));
        }

        collect(passes, &mut outcomes).await;
        outcomes
    }

    /// Builds one gateway per configured server and syncs them all. A server whose gateway cannot
    /// be built is reported under its own key only. Servers with a pass already running are
    /// skipped before their gateway is built.
    #[tracing::instrument(level = "debug", skip_all, fields(servers = servers.len()))]
    pub async fn sync_servers(&self, servers: &[ServerConnection]) -> ServerOutcomes {
        let mut outcomes = ServerOutcomes::new();
        let mut passes = Vec::with_capacity(servers.len());

        for conn in servers {
            let Some(guard) = self.begin(&conn.id) else {
                tracing::debug!(server_id = %conn.id, "pass already running, skipping");
                outcomes.insert(conn.id.clone(), Ok(SyncResult::default()));
                continue;
            };
            match GraphqlGateway::from_connection(conn) {
                Ok(gateway) => {
                    passes.push(self.spawn_pass(guard, conn.id.clone(), Arc::new(gateway)));
                }
                Err(e) => {
                    tracing::error!(server_id = %conn.id, error = %e, "cannot build gateway");
                    outcomes.insert(conn.id.clone(), Err(SyncError::from(e)));
                }
            }
        }

        collect(passes, &mut outcomes).await;
        outcomes
    }

    fn spawn_pass(
        &self,
        guard: InFlightGuard,
        server_id: String,
        gateway: Arc<dyn ProgressGateway>,
    ) -> Pass {
        let store = Arc::clone(&self.store);
        let options = self.options.clone();
        let task_server_id = server_id.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            Reconciler::new(store.as_ref(), gateway.as_ref(), &options)
                .run(&task_server_id)
                .await
        });
        (server_id, handle)
    }

    /// Background trigger: syncs every `period` until `shutdown` flips to true or its sender is
    /// dropped.
    pub async fn run_periodic(
        &self,
        servers: Vec<ServerConnection>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_secs = period.as_secs(), "starting periodic sync");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcomes = self.sync_servers(&servers).await;
                    let synced: u32 = outcomes
                        .values()
                        .filter_map(|o| o.as_ref().ok())
                        .map(|r| r.synced_count)
                        .sum();
                    tracing::info!(servers = outcomes.len(), synced, "periodic sync finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("periodic sync stopped");
    }
}

type Pass = (String, JoinHandle<Result<SyncResult, SyncError>>);

async fn collect(passes: Vec<Pass>, outcomes: &mut ServerOutcomes) {
    for (server_id, handle) in passes {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(SyncError::Aborted(e.to_string())),
        };
        if let Err(e) = &outcome {
            tracing::error!(%server_id, error = %e, "sync pass failed");
        }
        outcomes.insert(server_id, outcome);
    }
}
