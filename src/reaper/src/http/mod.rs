//! HTTP exposure: `/metrics` in the prometheus text format and a `/health`
//! probe endpoint, served from one listener.

pub mod health;
pub mod metrics;

use std::sync::Arc;

use axum::{Router, routing::get};
use prometheus::Registry;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("http server error: {0}")]
    Serve(std::io::Error),
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct HttpState {
    pub metrics_registry: Arc<Registry>,
    pub service_start_time: std::time::Instant,
}

/// Create the router with all endpoints.
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
}

/// Bind `listen` and serve until the task is dropped.
pub async fn run_http_server(listen: String, metrics_registry: Arc<Registry>) -> Result<(), HttpError> {
    let listener = TcpListener::bind(&listen)
        .await
        .map_err(|source| HttpError::Bind {
            addr: listen.clone(),
            source,
        })?;

    info!(addr = %listen, "starting HTTP server");
    serve(listener, metrics_registry).await
}

/// Serve on an already-bound listener. Split out so tests can bind an
/// ephemeral port first.
pub async fn serve(listener: TcpListener, metrics_registry: Arc<Registry>) -> Result<(), HttpError> {
    let state = HttpState {
        metrics_registry,
        service_start_time: std::time::Instant::now(),
    };

    axum::serve(listener, create_router(state))
        .await
        .map_err(HttpError::Serve)
}
