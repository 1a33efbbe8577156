//! Courtside Back binary entrypoint wiring REST, SSE, and the club store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtside_back::{
    config::{AppConfig, StoreBackend},
    dao::{
        club_store::{
            ClubStore,
            memory::{MemoryClubStore, MemorySeed},
        },
        storage::StorageError,
    },
    routes,
    services::{panel_service, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    spawn_storage(app_state.clone(), StoreBackend::from_env())?;
    tokio::spawn(panel_service::run_idle_sweep(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the selected backend. The server stays in degraded
/// mode until the first connection succeeds.
fn spawn_storage(state: SharedState, backend: StoreBackend) -> anyhow::Result<()> {
    match backend {
        StoreBackend::Memory { seed } => {
            let seed = match seed {
                Some(path) => MemorySeed::from_file(&path)
                    .with_context(|| format!("loading memory seed {}", path.display()))?,
                None => MemorySeed::default(),
            };
            let store = MemoryClubStore::with_seed(seed);
            info!("using in-memory club store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ClubStore>) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        StoreBackend::Mongo => {
            use courtside_back::dao::club_store::mongodb::{MongoClubStore, MongoConfig};

            info!("using MongoDB club store");
            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoClubStore::connect(config).await?;
                Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ClubStore>)
            }));
        }
        #[cfg(not(feature = "mongo-store"))]
        StoreBackend::Mongo => {
            error!("MongoDB backend requested but the `mongo-store` feature is disabled");
            anyhow::bail!("set CLUB_STORE=memory or rebuild with the `mongo-store` feature");
        }
    }
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
