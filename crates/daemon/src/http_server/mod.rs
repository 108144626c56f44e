use axum::Router;
use common::prelude::MemoryDirectory;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod api;
mod config;
mod handlers;
mod health;

pub use api::client::{HttpDirectory, HttpDirectoryError};
pub use config::Config;

const API_PREFIX: &str = "/v0";
const STATUS_PREFIX: &str = "/_status";

/// Routes of a directory node: `/_status` + `/v0/directory`
pub fn router(config: &Config, directory: MemoryDirectory) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(config.log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    Router::new()
        .nest(STATUS_PREFIX, health::router(directory.clone()))
        .nest(API_PREFIX, api::v0::router(directory.clone()))
        .fallback(handlers::not_found_handler)
        .with_state(directory)
        .layer(trace_layer)
}

/// Bind `config.listen_addr` and serve the directory until `shutdown_rx` fires.
pub async fn run(
    config: Config,
    directory: MemoryDirectory,
    shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    serve(listener, &config, directory, shutdown_rx).await
}

/// Serve on an already bound listener
pub async fn serve(
    listener: TcpListener,
    config: &Config,
    directory: MemoryDirectory,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let router = router(config, directory);

    tracing::info!(addr = ?listener.local_addr()?, "directory node listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
