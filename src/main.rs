use std::{path::Path, sync::Arc};

use anyhow::Context;
use migration::MigratorTrait;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use progress_sync::{
    api::ProgressSyncApi,
    config::Config,
    storage::SeaOrmProgressStore,
    sync::Scheduler,
};
use sea_orm::Database;
use tokio::sync::watch;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type ProgressSyncResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> ProgressSyncResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for deps.
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,sea_orm=warn,sqlx=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting progress sync agent"
    );
    // Load environment variables from .env files
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let db_conn = Database::connect(&config.db_connection_string)
        .await
        .with_context(|| "Failed to connect to database")?;

    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "Failed to run database migrations")?;

    let store = Arc::new(SeaOrmProgressStore::new(db_conn));
    let scheduler = Arc::new(Scheduler::new(store, config.sync_options()));
    tracing::info!(
        servers = config.servers.len(),
        servers_file = %config.servers_file,
        "configured servers"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let periodic = if config.sync_interval.is_zero() {
        tracing::info!("periodic sync disabled");
        None
    } else {
        let scheduler = Arc::clone(&scheduler);
        let servers = config.servers.clone();
        let interval = config.sync_interval;
        Some(tokio::spawn(async move {
            scheduler.run_periodic(servers, interval, shutdown_rx).await
        }))
    };

    let served = run_poem(scheduler, Arc::new(config)).await;
    let _ = shutdown_tx.send(true);
    if let Some(handle) = periodic {
        handle.await.with_context(|| "Periodic sync task panicked")?;
    }
    served
}

pub async fn run_poem(scheduler: Arc<Scheduler>, config: Arc<Config>) -> ProgressSyncResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let api = ProgressSyncApi {
        scheduler,
        servers: Arc::new(config.servers.clone()),
    };
    let bind_addr = config.bind_addr.clone();
    let api_service = OpenApiService::new(api, "Progress Sync API", version)
        .server(format!("http://{}", bind_addr));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr))
        .run_with_graceful_shutdown(
            route,
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
            None,
        )
        .await?;
    Ok(())
}
