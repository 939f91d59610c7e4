//! Tune Trivia Back binary entrypoint wiring REST, WebSocket, video search and the song catalog.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tune_trivia_back::{
    config::{AppConfig, Secrets},
    dao::{
        catalog_store::{CatalogStore, memory::MemoryCatalogStore},
        video_search::{VideoSearch, YoutubeClient},
    },
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let secrets = Secrets::from_env();
    if secrets.admin_token.is_none() {
        warn!("ADMIN_TOKEN not set; library management routes are disabled");
    }

    let video_search: Option<Arc<dyn VideoSearch>> = match secrets.youtube_api_key {
        Some(key) => Some(Arc::new(
            YoutubeClient::new(key, config.search.max_results)
                .context("building video search client")?,
        )),
        None => {
            warn!("YOUTUBE_API_KEY not set; video search is disabled");
            None
        }
    };

    let cleanup_interval = config.search.cleanup_interval;
    let app_state = AppState::new(config, secrets.admin_token, video_search);
    app_state.search_cache().start_cleaner(cleanup_interval);

    start_catalog(app_state.clone()).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

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

    app_state.search_cache().dispose();
    Ok(())
}

/// Use CouchDB when `COUCH_BASE_URL` is set, the in-memory catalog otherwise.
#[cfg(feature = "couch-store")]
async fn start_catalog(state: SharedState) {
    use tune_trivia_back::{
        dao::catalog_store::{StorageError, couchdb::{CouchCatalogStore, CouchConfig}},
        services::storage_supervisor,
    };

    match CouchConfig::from_env() {
        Ok(couch) => {
            info!(base_url = %couch.base_url, database = %couch.database, "using CouchDB catalog");
            tokio::spawn(storage_supervisor::run(state, move || {
                let couch = couch.clone();
                async move {
                    let store = CouchCatalogStore::connect(couch)
                        .await
                        .map_err(StorageError::from)?;
                    Ok(Arc::new(store) as Arc<dyn CatalogStore>)
                }
            }));
        }
        Err(err) => {
            info!(reason = %err, "CouchDB not configured; using in-memory catalog");
            install_memory_catalog(&state).await;
        }
    }
}

#[cfg(not(feature = "couch-store"))]
async fn start_catalog(state: SharedState) {
    info!("using in-memory catalog");
    install_memory_catalog(&state).await;
}

async fn install_memory_catalog(state: &SharedState) {
    state
        .install_catalog_store(Arc::new(MemoryCatalogStore::new()))
        .await;
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
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
