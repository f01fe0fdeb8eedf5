//! Tilebeat binary entrypoint wiring REST, WebSocket and the KV store supervisor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tilebeat::{
    config::AppConfig,
    dao::{
        kv::{
            Kv,
            memory::MemoryKvStore,
            upstash::{UpstashConfig, UpstashKvStore},
        },
        storage::StorageError,
    },
    providers::Collaborators,
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let collaborators = Collaborators::from_env(config.provider_timeout);
    let app_state = AppState::new(config, collaborators);

    attach_store(&app_state).await;
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

/// Supervise Upstash when it is configured, otherwise serve from process memory.
async fn attach_store(state: &SharedState) {
    match UpstashConfig::from_env() {
        Ok(upstash) => {
            let upstash = upstash.with_request_timeout(state.config().provider_timeout);
            info!(url = %upstash.url, "using Upstash KV store");
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let upstash = upstash.clone();
                async move {
                    let store = UpstashKvStore::connect(upstash)
                        .await
                        .map_err(StorageError::from)?;
                    Ok(Kv::new(Arc::new(store)))
                }
            }));
        }
        Err(err) => {
            warn!(error = %err, "Upstash not configured; sessions live in process memory");
            state
                .install_kv(Kv::new(Arc::new(MemoryKvStore::new())))
                .await;
        }
    }
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
