// src/server/health_server.rs

use crate::core::metrics::gather_metrics;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, "Service is running")
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Handles HTTP requests to the /metrics endpoint in the Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        gather_metrics(),
    )
}

/// The liveness routes. None of them touch relay state.
pub fn health_router() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}

/// Serves the liveness routes on `listener` until shutdown is signalled.
pub async fn run_health_server(
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    axum::serve(listener, health_router())
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Liveness server shutting down.");
        })
        .await
}
